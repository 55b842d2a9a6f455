use clap::{ArgAction, Args};

use crate::config::Options;
use crate::store::{MapKind, RepoStore};
use crate::sync::Selection;
use crate::types::Kind;

/// Where the platform is and who is talking to it.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// Platform URL
    #[arg(long)]
    pub url: Option<String>,

    /// MQTT broker address (host[:port])
    #[arg(long = "messaging-url")]
    pub messaging_url: Option<String>,

    /// System key
    #[arg(long = "system-key")]
    pub system_key: Option<String>,

    /// Developer email
    #[arg(long)]
    pub email: Option<String>,

    /// Developer password
    #[arg(long)]
    pub password: Option<String>,

    /// Developer token; skips the login prompt
    #[arg(long = "dev-token")]
    pub dev_token: Option<String>,
}

/// Modifiers shared by export, pull and push.
#[derive(Args, Debug, Clone, Default)]
pub struct ModifierArgs {
    /// Pull collection rows, not only schemas
    #[arg(long = "exportrows")]
    pub export_rows: bool,

    /// Pull users along with the rest of the system
    #[arg(long = "exportusers")]
    pub export_users: bool,

    /// Keep item_id in exported rows
    #[arg(long = "exportitemid", action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub export_item_id: Option<bool>,

    /// Sort exported rows by item_id
    #[arg(long = "sort-collections")]
    pub sort_collections: bool,

    /// Rows per page when reading collections
    #[arg(long = "data-page-size")]
    pub data_page_size: Option<usize>,

    /// Answer yes to every create/delete prompt
    #[arg(long = "auto-approve")]
    pub auto_approve: bool,

    /// Remove local assets that no longer exist remotely
    #[arg(long)]
    pub cleanup: bool,

    /// Retries for reads that fail on the network
    #[arg(long = "max-retries")]
    pub max_retries: Option<u32>,
}

impl ModifierArgs {
    /// Layers the flags over options loaded from the repo.
    pub fn apply(&self, options: &mut Options) {
        options.export_rows |= self.export_rows;
        options.export_users |= self.export_users;
        if let Some(keep) = self.export_item_id {
            options.export_item_id = keep;
        }
        options.sort_collections |= self.sort_collections;
        if let Some(size) = self.data_page_size {
            options.data_page_size = size;
        }
        options.auto_approve = self.auto_approve;
        options.cleanup = self.cleanup;
        if let Some(retries) = self.max_retries {
            options.max_retries = retries;
        }
    }
}

/// Per-kind asset selectors.
#[derive(Args, Debug, Clone, Default)]
pub struct AssetArgs {
    /// Code service name
    #[arg(long)]
    pub service: Vec<String>,
    #[arg(long = "all-services")]
    pub all_services: bool,

    /// Code library name
    #[arg(long)]
    pub library: Vec<String>,
    #[arg(long = "all-libraries")]
    pub all_libraries: bool,

    /// Collection name
    #[arg(long)]
    pub collection: Vec<String>,
    /// Collection ID
    #[arg(long = "collectionID")]
    pub collection_id: Vec<String>,
    #[arg(long = "all-collections")]
    pub all_collections: bool,

    /// Role name
    #[arg(long)]
    pub role: Vec<String>,
    #[arg(long = "all-roles")]
    pub all_roles: bool,

    /// User email
    #[arg(long)]
    pub user: Vec<String>,
    /// User ID
    #[arg(long = "userID")]
    pub user_id: Vec<String>,
    #[arg(long = "all-users")]
    pub all_users: bool,

    /// Trigger name
    #[arg(long)]
    pub trigger: Vec<String>,
    #[arg(long = "all-triggers")]
    pub all_triggers: bool,

    /// Timer name
    #[arg(long)]
    pub timer: Vec<String>,
    #[arg(long = "all-timers")]
    pub all_timers: bool,

    /// Edge name
    #[arg(long)]
    pub edge: Vec<String>,
    #[arg(long = "all-edges")]
    pub all_edges: bool,

    /// Device name
    #[arg(long)]
    pub device: Vec<String>,
    #[arg(long = "all-devices")]
    pub all_devices: bool,

    /// Portal name
    #[arg(long)]
    pub portal: Vec<String>,
    #[arg(long = "all-portals")]
    pub all_portals: bool,

    /// Plugin name
    #[arg(long)]
    pub plugin: Vec<String>,
    #[arg(long = "all-plugins")]
    pub all_plugins: bool,

    /// Adapter name
    #[arg(long)]
    pub adapter: Vec<String>,
    #[arg(long = "all-adapters")]
    pub all_adapters: bool,

    /// Deployment name
    #[arg(long)]
    pub deployment: Vec<String>,
    #[arg(long = "all-deployments")]
    pub all_deployments: bool,

    /// Every asset of every kind
    #[arg(long)]
    pub all: bool,
}

impl AssetArgs {
    fn per_kind(&self) -> [(Kind, &[String], bool); 13] {
        [
            (Kind::Collection, &self.collection, self.all_collections),
            (Kind::Role, &self.role, self.all_roles),
            (Kind::User, &self.user, self.all_users),
            (Kind::Service, &self.service, self.all_services),
            (Kind::Library, &self.library, self.all_libraries),
            (Kind::Trigger, &self.trigger, self.all_triggers),
            (Kind::Timer, &self.timer, self.all_timers),
            (Kind::Edge, &self.edge, self.all_edges),
            (Kind::Device, &self.device, self.all_devices),
            (Kind::Portal, &self.portal, self.all_portals),
            (Kind::Plugin, &self.plugin, self.all_plugins),
            (Kind::Adapter, &self.adapter, self.all_adapters),
            (Kind::Deployment, &self.deployment, self.all_deployments),
        ]
    }

    /// Resolves the flags into a selection. IDs are mapped to names through
    /// the repo's name to ID maps.
    pub fn selection(&self, store: &RepoStore) -> anyhow::Result<Selection> {
        if self.all {
            return Ok(Selection::everything());
        }

        let mut sel = Selection::new();
        for (kind, names, all) in self.per_kind() {
            if all {
                sel.add_all(kind);
            }
            for name in names {
                sel.add_name(kind, name.clone());
            }
        }

        for id in &self.collection_id {
            let name = store
                .name_for(MapKind::Collections, id)?
                .ok_or_else(|| anyhow::anyhow!("No collection with ID '{id}' in this repo"))?;
            sel.add_name(Kind::Collection, name);
        }
        for id in &self.user_id {
            let name = store
                .name_for(MapKind::Users, id)?
                .ok_or_else(|| anyhow::anyhow!("No user with ID '{id}' in this repo"))?;
            sel.add_name(Kind::User, name);
        }

        Ok(sel)
    }

    /// Named assets only, for commands that refuse "all" selectors.
    pub fn named(&self) -> anyhow::Result<Vec<(Kind, String)>> {
        if self.all || self.per_kind().iter().any(|(_, _, all)| *all) {
            anyhow::bail!("This command takes asset names, not -all selectors");
        }
        Ok(self
            .per_kind()
            .into_iter()
            .flat_map(|(kind, names, _)| names.iter().map(move |n| (kind, n.clone())))
            .collect())
    }
}

#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// Code service to execute
    #[arg(long)]
    pub service: Option<String>,

    /// JSON parameters for the service
    #[arg(long, default_value = "{}")]
    pub params: String,

    /// MQTT topic to publish to
    #[arg(long)]
    pub topic: Option<String>,

    /// Message payload
    #[arg(long, default_value = "")]
    pub payload: String,

    /// Seconds to wait for the broker's acknowledgement
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,
}
