//! Denormalized view entities. These are derived copies of service rows with
//! foreign keys resolved into full objects; the service remains the source
//! of truth and every field here is reconstructible from it.

use std::collections::HashSet;

use datasvc::rows::{ChallengeRow, IdeaRow, UserRow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub bio: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: row.id,
            name: row.name,
            email: row.email,
            avatar_url: row.avatarurl,
            bio: row.bio,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Money,
    Equity,
    Job,
    Other,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Money => "money",
            RewardType::Equity => "equity",
            RewardType::Job => "job",
            RewardType::Other => "other",
        }
    }

    /// Unknown tags map to `Other` rather than failing the row.
    pub fn parse(s: &str) -> Self {
        match s {
            "money" => RewardType::Money,
            "equity" => RewardType::Equity,
            "job" => RewardType::Job,
            _ => RewardType::Other,
        }
    }
}

/// What a poster offers a solver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reward {
    pub kind: RewardType,
    pub value: String,
}

impl Reward {
    /// Display string: money rewards get the rupee symbol and Indian digit
    /// grouping, everything else shows the raw value.
    pub fn display(&self) -> String {
        if self.kind != RewardType::Money {
            return self.value.clone();
        }
        match self.value.replace(',', "").parse::<i64>() {
            Ok(amount) => format!("₹{}", group_inr(amount)),
            Err(_) => format!("₹ {}", self.value),
        }
    }
}

/// Indian grouping: last three digits, then pairs (1,00,000).
fn group_inr(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let (head, tail) = if digits.len() > 3 {
        digits.split_at(digits.len() - 3)
    } else {
        ("", digits.as_str())
    };
    let head_chars: Vec<char> = head.chars().collect();
    let mut groups: Vec<String> = Vec::new();
    let mut i = head_chars.len();
    while i > 0 {
        let start = i.saturating_sub(2);
        groups.push(head_chars[start..i].iter().collect());
        i = start;
    }
    groups.reverse();
    let mut out = String::new();
    if amount < 0 {
        out.push('-');
    }
    for g in groups {
        out.push_str(&g);
        out.push(',');
    }
    out.push_str(tail);
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub posted_by: User,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOption {
    pub id: Uuid,
    pub text: String,
    pub votes: HashSet<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poll {
    pub id: Uuid,
    pub options: Vec<PollOption>,
}

impl Poll {
    pub fn total_votes(&self) -> usize {
        self.options.iter().map(|o| o.votes.len()).sum()
    }

    /// Percentage of votes on one option; 0.0 for an empty poll.
    pub fn vote_share(&self, option_id: Uuid) -> f64 {
        let total = self.total_votes();
        if total == 0 {
            return 0.0;
        }
        let votes = self
            .options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.votes.len())
            .unwrap_or(0);
        votes as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub text: String,
    pub image_url: Option<String>,
    pub poll: Option<Poll>,
    pub posted_by: User,
    pub created_at: i64,
    pub likes: HashSet<Uuid>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Problem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub detailed_description: String,
    pub industry: String,
    pub reward: Reward,
    pub posted_by: User,
    pub created_at: i64,
}

impl Problem {
    pub fn from_row(row: ChallengeRow, posted_by: User) -> Self {
        Self {
            id: row.challengeid,
            title: row.title,
            description: row.description,
            detailed_description: row.detaileddescription,
            industry: row.industry,
            reward: Reward {
                kind: RewardType::parse(&row.rewardtype),
                value: row.rewardvalue,
            },
            posted_by,
            created_at: row.createdat,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Idea {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub detailed_description: String,
    pub reward: Reward,
    pub posted_by: User,
    pub created_at: i64,
}

impl Idea {
    pub fn from_row(row: IdeaRow, posted_by: User) -> Self {
        Self {
            id: row.ideaid,
            title: row.title,
            summary: row.summary,
            detailed_description: row.detaileddescription,
            reward: Reward {
                kind: RewardType::parse(&row.rewardtype),
                value: row.rewardvalue,
            },
            posted_by,
            created_at: row.createdat,
        }
    }
}

/// The two kinds of content a chat can attach to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Item {
    Problem(Problem),
    Idea(Idea),
}

impl Item {
    pub fn id(&self) -> Uuid {
        match self {
            Item::Problem(p) => p.id,
            Item::Idea(i) => i.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Item::Problem(p) => &p.title,
            Item::Idea(i) => &i.title,
        }
    }

    pub fn posted_by(&self) -> &User {
        match self {
            Item::Problem(p) => &p.posted_by,
            Item::Idea(i) => &i.posted_by,
        }
    }

    /// Wire tag stored in `chats.itemtype`.
    pub fn item_type(&self) -> &'static str {
        match self {
            Item::Problem(_) => "challenge",
            Item::Idea(_) => "idea",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub sender: User,
    pub timestamp: i64,
}

/// Per-viewer projection of a chat for the recent-conversations list.
/// Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecentChat {
    pub chat_id: Uuid,
    pub item: Item,
    pub other_participant: User,
    pub last_message_text: Option<String>,
    pub last_message_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppNotification {
    pub id: Uuid,
    pub actor: User,
    pub message: String,
    pub created_at: i64,
    pub seen: bool,
}
