use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PearlType {
    Insight,
    Framework,
    Experience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shareability {
    Private,
    FriendsOnly,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PearlOriginType {
    Manual,
    Extracted,
    Synthesized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pearl {
    pub id: uuid::Uuid,
    pub owner_id: String,
    pub pearl_type: PearlType,
    pub trigger_text: String,
    pub body: Option<String>,
    pub context: Option<String>,
    pub domain_tags: Vec<String>,
    pub luster: f64,
    pub shareability: Shareability,
    pub origin_type: PearlOriginType,
    pub created_at: DateTime<Utc>,
}

impl Pearl {
    /// The domain used for trust bookkeeping: first tag, or the sentinel.
    pub fn primary_domain(&self) -> &str {
        self.domain_tags.first().map(String::as_str).unwrap_or("_overall")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PearlReference {
    pub id: uuid::Uuid,
    pub pearl_id: uuid::Uuid,
    pub referenced_in: String,
    pub created_at: DateTime<Utc>,
}

/// UNIQUE (pearl, endorser); a repeat endorsement overwrites the prior one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PearlEndorsement {
    pub pearl_id: uuid::Uuid,
    pub endorser_id: String,
    pub score: f64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PearlShare {
    pub id: uuid::Uuid,
    pub pearl_id: uuid::Uuid,
    pub from_claw_id: String,
    pub to_claw_id: String,
    pub created_at: DateTime<Utc>,
}
