use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::activity::ActivityLog;
use crate::node::{empty_forest, BookmarkStyle, FolderStyle, Node};
use crate::settings::Settings;
use crate::store::KeyValueStore;
use crate::undo::UndoLog;

pub const PROFILES_KEY: &str = "userProfiles";
pub const ACTIVE_KEY: &str = "activeProfile";
pub const DEFAULT_PROFILE_NAME: &str = "Default";

pub fn profile_key(user_id: &str) -> String {
    format!("userProfile:{}", user_id)
}

/// Everything a user owns: the forest plus styling, settings and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub active: bool,
    pub name: String,
    pub user_id: String,
    pub current_user_bookmarks: Vec<Node>,
    #[serde(default)]
    pub default_user_folder_style: FolderStyle,
    #[serde(default)]
    pub default_user_bookmark_style: BookmarkStyle,
    #[serde(default)]
    pub main_user_settings: Settings,
    #[serde(default)]
    pub user_activity_log: ActivityLog,
    #[serde(default)]
    pub user_undo_log: UndoLog,
}

impl UserProfile {
    pub fn new(name: &str) -> Self {
        let user_id = Uuid::new_v4().simple().to_string();
        let settings = Settings::default();
        Self {
            active: false,
            name: name.to_string(),
            user_id: user_id.clone(),
            current_user_bookmarks: empty_forest(),
            default_user_folder_style: FolderStyle::default(),
            default_user_bookmark_style: BookmarkStyle::default(),
            user_undo_log: UndoLog::new(settings.max_undo_entries),
            main_user_settings: settings,
            user_activity_log: ActivityLog::new(&user_id),
        }
    }

    pub fn forest(&self) -> &[Node] {
        &self.current_user_bookmarks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub user_id: String,
    pub name: String,
}

/// Profile records in a key-value store.
pub struct ProfileManager<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ProfileManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub async fn list(&self) -> Result<Vec<ProfileSummary>> {
        match self.store.get(PROFILES_KEY).await? {
            Some(value) => serde_json::from_value(value).context("Corrupt profile list"),
            None => Ok(Vec::new()),
        }
    }

    async fn save_list(&mut self, list: &[ProfileSummary]) -> Result<()> {
        self.store.save(PROFILES_KEY, serde_json::to_value(list)?).await
    }

    pub async fn find(&self, name: &str) -> Result<ProfileSummary> {
        self.list()
            .await?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("❌ No profile named '{}'", name))
    }

    pub async fn load(&self, user_id: &str) -> Result<UserProfile> {
        let value = self
            .store
            .get(&profile_key(user_id))
            .await?
            .ok_or_else(|| anyhow!("Profile record {} is missing", user_id))?;
        let mut profile: UserProfile =
            serde_json::from_value(value).with_context(|| format!("Corrupt profile record {}", user_id))?;

        if let Err(e) = profile.main_user_settings.validate() {
            warn!("⚠️  Profile '{}' has invalid settings ({}); using defaults", profile.name, e);
            profile.main_user_settings = Settings::default();
            profile
                .user_undo_log
                .set_max_length(profile.main_user_settings.max_undo_entries);
        }
        Ok(profile)
    }

    pub async fn save(&mut self, profile: &UserProfile) -> Result<()> {
        let value = serde_json::to_value(profile)?;
        self.store.save(&profile_key(&profile.user_id), value).await
    }

    pub async fn active_user_id(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(ACTIVE_KEY)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub async fn create(&mut self, name: &str) -> Result<UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            bail!("❌ Profile name cannot be empty");
        }
        let mut list = self.list().await?;
        if list.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
            bail!("❌ A profile named '{}' already exists", name);
        }

        let profile = UserProfile::new(name);
        self.save(&profile).await?;
        list.push(ProfileSummary {
            user_id: profile.user_id.clone(),
            name: profile.name.clone(),
        });
        self.save_list(&list).await?;
        info!("👤 Created profile '{}' ({})", profile.name, profile.user_id);
        Ok(profile)
    }

    /// The active profile. On first use a `Default` profile is created.
    pub async fn load_active(&mut self) -> Result<UserProfile> {
        if let Some(user_id) = self.active_user_id().await? {
            match self.load(&user_id).await {
                Ok(profile) => return Ok(profile),
                Err(e) => warn!("⚠️  Active profile could not be loaded: {}", e),
            }
        }

        let list = self.list().await?;
        let name = match list.first() {
            Some(first) => first.name.clone(),
            None => self.create(DEFAULT_PROFILE_NAME).await?.name,
        };
        self.switch(&name).await
    }

    /// Make `name` the active profile and return it.
    pub async fn switch(&mut self, name: &str) -> Result<UserProfile> {
        let target = self.find(name).await?;

        if let Some(current_id) = self.active_user_id().await? {
            if current_id != target.user_id {
                if let Ok(mut current) = self.load(&current_id).await {
                    current.active = false;
                    self.save(&current).await?;
                }
            }
        }

        let mut profile = self.load(&target.user_id).await?;
        profile.active = true;
        self.save(&profile).await?;
        self.store
            .save(ACTIVE_KEY, serde_json::Value::String(target.user_id.clone()))
            .await?;
        info!("🔀 Active profile is now '{}'", profile.name);
        Ok(profile)
    }

    pub async fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            bail!("❌ Profile name cannot be empty");
        }
        let mut list = self.list().await?;
        if list
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(new_name) && !p.name.eq_ignore_ascii_case(name))
        {
            bail!("❌ A profile named '{}' already exists", new_name);
        }
        let summary = list
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("❌ No profile named '{}'", name))?;
        summary.name = new_name.to_string();
        let user_id = summary.user_id.clone();

        let mut profile = self.load(&user_id).await?;
        profile.name = new_name.to_string();
        self.save(&profile).await?;
        self.save_list(&list).await?;
        Ok(())
    }

    /// Delete a profile that is not currently active.
    pub async fn remove(&mut self, name: &str) -> Result<()> {
        let target = self.find(name).await?;
        if self.active_user_id().await?.as_deref() == Some(target.user_id.as_str()) {
            bail!("❌ Cannot remove the active profile '{}'; switch first", target.name);
        }

        let list: Vec<ProfileSummary> = self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.user_id != target.user_id)
            .collect();
        self.store.remove(&profile_key(&target.user_id)).await?;
        self.save_list(&list).await?;
        info!("🗑️  Removed profile '{}'", target.name);
        Ok(())
    }
}
