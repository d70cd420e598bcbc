use crate::activity::{Activity, ActivityParty, ActivitySecrets, ActivityTimestamps};
use serde::Serialize;
use uuid::Uuid;

/// The `SET_ACTIVITY` command frame body.
#[derive(Debug, Clone, Serialize)]
pub struct CommandPayload {
    pub cmd: &'static str,
    pub args: CommandArgs,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandArgs {
    pub pid: u32,
    pub activity: ActivityPayload,
}

/// Activity fields in the host's wire shape: image assets nested under
/// `assets`, progress under `timestamps`, empty strings omitted.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityPayload {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(rename = "type")]
    pub kind: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<AssetsPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<PartyPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<SecretsPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<TimestampsPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetsPayload {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub large_image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub large_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub small_image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub small_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartyPayload {
    pub id: String,
    pub size: [i64; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretsPayload {
    #[serde(rename = "match")]
    pub match_secret: String,
    pub join: String,
    pub spectate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimestampsPayload {
    pub start: i64,
    pub end: i64,
}

impl From<&Activity> for ActivityPayload {
    fn from(activity: &Activity) -> Self {
        let has_assets = !activity.large_image_key.is_empty()
            || !activity.large_image_text.is_empty()
            || !activity.small_image_key.is_empty()
            || !activity.small_image_text.is_empty();
        Self {
            name: activity.name.clone(),
            state: activity.state.clone(),
            details: activity.details.clone(),
            kind: activity.kind,
            assets: has_assets.then(|| AssetsPayload {
                large_image: activity.large_image_key.clone(),
                large_text: activity.large_image_text.clone(),
                small_image: activity.small_image_key.clone(),
                small_text: activity.small_image_text.clone(),
            }),
            party: activity.party.as_ref().map(PartyPayload::from),
            secrets: activity.secrets.as_ref().map(SecretsPayload::from),
            timestamps: activity.timestamps.as_ref().map(TimestampsPayload::from),
        }
    }
}

impl From<&ActivityParty> for PartyPayload {
    fn from(party: &ActivityParty) -> Self {
        Self {
            id: party.id.clone(),
            size: [party.players, party.max_players],
        }
    }
}

impl From<&ActivitySecrets> for SecretsPayload {
    fn from(secrets: &ActivitySecrets) -> Self {
        Self {
            match_secret: secrets.r#match.clone(),
            join: secrets.join.clone(),
            spectate: secrets.spectate.clone(),
        }
    }
}

impl From<&ActivityTimestamps> for TimestampsPayload {
    fn from(timestamps: &ActivityTimestamps) -> Self {
        Self {
            start: timestamps.start,
            end: timestamps.end,
        }
    }
}

/// Build a `SET_ACTIVITY` command for this process.
pub fn set_activity(activity: &Activity) -> CommandPayload {
    CommandPayload {
        cmd: "SET_ACTIVITY",
        args: CommandArgs {
            pid: std::process::id(),
            activity: activity.into(),
        },
        nonce: Uuid::new_v4().to_string(),
    }
}

/// Protocol-version handshake body.
#[derive(Debug, Clone, Serialize)]
pub struct Handshake {
    pub v: u32,
    pub client_id: String,
}
