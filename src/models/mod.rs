use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};

/// Priority tag of a todo. `Green` is a legacy value: still rendered, no longer selectable.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TodoColor {
    #[default]
    None,
    Red,
    Yellow,
    Blue,
    Green,
    /// Anything the current client does not know about.
    #[serde(other)]
    Unrecognized,
}

impl TodoColor {
    /// Colors offered in the priority picker.
    pub const SELECTABLE: [TodoColor; 4] = [
        TodoColor::None,
        TodoColor::Red,
        TodoColor::Yellow,
        TodoColor::Blue,
    ];

    /// Sort key for "sort by priority".
    pub fn priority_rank(self) -> u8 {
        match self {
            TodoColor::Red => 1,
            TodoColor::Yellow => 2,
            TodoColor::Blue => 3,
            _ => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TodoColor::Red => "Priority 1",
            TodoColor::Yellow => "Priority 2",
            TodoColor::Blue => "Priority 3",
            TodoColor::Green => "Priority 4",
            TodoColor::None | TodoColor::Unrecognized => "No priority",
        }
    }

    pub fn dot_class(self) -> &'static str {
        match self {
            TodoColor::Red => "bg-red-500",
            TodoColor::Yellow => "bg-yellow-400",
            TodoColor::Blue => "bg-blue-500",
            TodoColor::Green => "bg-green-500",
            TodoColor::None | TodoColor::Unrecognized => "bg-slate-300",
        }
    }

    pub fn from_value(v: &str) -> Self {
        match v {
            "none" => TodoColor::None,
            "red" => TodoColor::Red,
            "yellow" => TodoColor::Yellow,
            "blue" => TodoColor::Blue,
            "green" => TodoColor::Green,
            _ => TodoColor::Unrecognized,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, strum::AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GoalCategory {
    Career,
    Health,
    Relationships,
    PersonalGrowth,
    Finance,
    Hobbies,
    Other,
}

impl GoalCategory {
    pub const ALL: [GoalCategory; 7] = [
        GoalCategory::Career,
        GoalCategory::Health,
        GoalCategory::Relationships,
        GoalCategory::PersonalGrowth,
        GoalCategory::Finance,
        GoalCategory::Hobbies,
        GoalCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GoalCategory::Career => "Career",
            GoalCategory::Health => "Health",
            GoalCategory::Relationships => "Relationships",
            GoalCategory::PersonalGrowth => "Personal Growth",
            GoalCategory::Finance => "Finance",
            GoalCategory::Hobbies => "Hobbies",
            GoalCategory::Other => "Other",
        }
    }

    pub fn from_value(v: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_ref() == v)
    }
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    OnHold,
}

impl GoalStatus {
    pub const ALL: [GoalStatus; 4] = [
        GoalStatus::NotStarted,
        GoalStatus::InProgress,
        GoalStatus::Completed,
        GoalStatus::OnHold,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GoalStatus::NotStarted => "Not Started",
            GoalStatus::InProgress => "In Progress",
            GoalStatus::Completed => "Completed",
            GoalStatus::OnHold => "On Hold",
        }
    }

    pub fn from_value(v: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_ref() == v)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Assigned by storage; never written back as a field.
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub color: TodoColor,
    /// Legacy field, kept so old documents still decode.
    #[serde(default)]
    pub category: Option<GoalCategory>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub list_id: Option<String>,
}

/// A todo before storage assigns its id.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    pub text: String,
    pub done: bool,
    pub color: TodoColor,
    pub category: Option<GoalCategory>,
    pub created_at: i64,
    pub order: i64,
    pub list_id: Option<String>,
}

impl NewTodo {
    /// An empty, undone item placed after every existing item.
    pub fn blank(list_id: Option<String>, created_at: i64, order: i64) -> Self {
        Self {
            text: String::new(),
            done: false,
            color: TodoColor::None,
            category: None,
            created_at,
            order,
            list_id,
        }
    }
}

/// Field updates a todo accepts. Scope fields (`listId`) are deliberately absent.
#[derive(Clone, Debug, PartialEq)]
pub enum TodoUpdate {
    Text(String),
    Color(TodoColor),
    Completion { done: bool, order: Option<i64> },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub order: i64,
}

impl TodoList {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unnamed List"
        } else {
            &self.name
        }
    }

    /// Update for a finished name edit. Empty or unchanged drafts revert instead.
    pub fn rename_update(&self, draft: &str) -> Option<ListUpdate> {
        let name = draft.trim();
        if name.is_empty() || name == self.name {
            None
        } else {
            Some(ListUpdate::Name(name.to_string()))
        }
    }

    /// Update for a finished description edit; an emptied description is still saved.
    pub fn describe_update(&self, draft: &str) -> Option<ListUpdate> {
        let description = draft.trim();
        if description == self.description {
            None
        } else {
            Some(ListUpdate::Description(description.to_string()))
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTodoList {
    pub name: String,
    pub description: String,
    pub created_at: i64,
    pub order: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ListUpdate {
    Name(String),
    Description(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(default)]
    pub category: Option<GoalCategory>,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub name: String,
    pub description: String,
    pub status: GoalStatus,
    pub category: Option<GoalCategory>,
    pub created_at: i64,
}

impl NewGoal {
    pub fn new(
        name: &str,
        description: &str,
        category: Option<GoalCategory>,
        created_at: i64,
    ) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }

        Ok(Self {
            name: name.to_string(),
            description: description.trim().to_string(),
            status: GoalStatus::NotStarted,
            category,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GoalUpdate {
    Details { name: String, description: String },
    Status(GoalStatus),
    Category(Option<GoalCategory>),
}

impl GoalUpdate {
    pub fn details(name: &str, description: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        Ok(Self::Details {
            name: name.to_string(),
            description: description.trim().to_string(),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersonalBrief {
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub who_you_are: String,
    #[serde(default)]
    pub what_you_want: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub show_completed: bool,
}

/// Rank for a new list: after every existing one.
pub fn next_list_order(lists: &[TodoList]) -> i64 {
    lists.iter().map(|l| l.order).max().map_or(0, |m| m + 1)
}

/// Goals per category, in display order. Uncategorized goals are not counted.
pub fn category_counts(goals: &[Goal]) -> Vec<(GoalCategory, usize)> {
    GoalCategory::ALL
        .into_iter()
        .map(|c| (c, goals.iter().filter(|g| g.category == Some(c)).count()))
        .collect()
}
