use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;


/// Resolved cover URLs by local cover file path. Grows for the process
/// lifetime, bounded by the distinct media directories visited in one run.
pub type CoverUrlCache = HashMap<PathBuf, String>;

/// Filenames accepted as cover art (matched case-insensitively).
const COVER_NAMES: &[&str] = &["cover.jpg", "cover.jpeg", "cover.png"];

/// Find a cover image in the media's containing directory.
pub fn find_cover_path(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let lowered = name.to_string_lossy().to_lowercase();
        if COVER_NAMES.contains(&lowered.as_str()) {
            return Some(dir.join(name));
        }
    }
    None
}

#[derive(Deserialize)]
struct ApplicationInfo {
    id: String,
}

#[derive(Deserialize)]
struct AttachmentResponse {
    attachment: Attachment,
}

#[derive(Deserialize)]
struct Attachment {
    url: String,
}

#[derive(Deserialize)]
struct ShortenResponse {
    data: ShortenData,
}

#[derive(Deserialize)]
struct ShortenData {
    tiny_url: String,
}

/// Cover-art resolution collaborator: upload the cover image as a Discord
/// application attachment, then shorten the attachment URL.
///
/// Every failure degrades to `None` so the caller falls back to the
/// client's own image asset; resolution problems never fail a tick.
pub struct CoverResolver {
    http: reqwest::Client,
    discord_token: Option<String>,
    tinyurl_token: Option<String>,
}

impl CoverResolver {
    pub fn new(discord_token: Option<String>, tinyurl_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            discord_token,
            tinyurl_token,
        }
    }

    /// Resolve the cover URL for a media directory, cache-first.
    pub async fn resolve(&self, cache: &mut CoverUrlCache, media_dir: &Path) -> Option<String> {
        let cover_path = find_cover_path(media_dir)?;
        if let Some(url) = cache.get(&cover_path) {
            return Some(url.clone());
        }

        let (discord_token, tinyurl_token) =
            match (&self.discord_token, &self.tinyurl_token) {
                (Some(discord), Some(tiny)) => (discord.clone(), tiny.clone()),
                _ => {
                    debug!("cover upload needs both the discord and tinyurl tokens");
                    return None;
                }
            };

        match self
            .upload_and_shorten(&discord_token, &tinyurl_token, &cover_path)
            .await
        {
            Ok(url) => {
                debug!(path = %cover_path.display(), url = %url, "cover resolved");
                cache.insert(cover_path, url.clone());
                Some(url)
            }
            Err(err) => {
                debug!(path = %cover_path.display(), error = %err, "cover resolution failed");
                None
            }
        }
    }

    async fn upload_and_shorten(
        &self,
        discord_token: &str,
        tinyurl_token: &str,
        cover_path: &Path,
    ) -> Result<String> {
        let url = self.upload(discord_token, cover_path).await?;
        self.shorten(tinyurl_token, &url).await
    }

    async fn application_id(&self, token: &str) -> Result<String> {
        let info: ApplicationInfo = self
            .http
            .get("https://discord.com/api/v10/applications/@me")
            .header("Authorization", format!("Bot {}", token))
            .send()
            .await
            .context("application lookup request failed")?
            .json()
            .await
            .context("application lookup returned malformed JSON")?;
        Ok(info.id)
    }

    async fn upload(&self, token: &str, cover_path: &Path) -> Result<String> {
        let app_id = self.application_id(token).await?;
        let bytes = tokio::fs::read(cover_path)
            .await
            .with_context(|| format!("reading cover image {}", cover_path.display()))?;
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name("cover.png"),
        );

        let response: AttachmentResponse = self
            .http
            .post(format!(
                "https://discord.com/api/v10/applications/{}/attachment",
                app_id
            ))
            .header("Authorization", format!("Bot {}", token))
            .multipart(form)
            .send()
            .await
            .context("attachment upload request failed")?
            .json()
            .await
            .context("attachment upload returned malformed JSON")?;
        if response.attachment.url.is_empty() {
            return Err(anyhow!("attachment upload returned an empty URL"));
        }
        Ok(response.attachment.url)
    }

    async fn shorten(&self, token: &str, url: &str) -> Result<String> {
        let response: ShortenResponse = self
            .http
            .post(format!(
                "https://api.tinyurl.com/create?api_token={}",
                token
            ))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .context("shortening request failed")?
            .json()
            .await
            .context("shortening returned malformed JSON")?;
        Ok(response.data.tiny_url)
    }
}
