//! Compose ファイルの型定義
//!
//! テンプレートで使われるキーのみを扱います。未知のキーは無視されます。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// docker-compose.yml のルート
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub services: BTreeMap<String, Service>,

    /// `networks: { backend: }` のように値が空の場合もある
    #[serde(default)]
    pub networks: BTreeMap<String, Option<NetworkDefinition>>,

    #[serde(default)]
    pub volumes: BTreeMap<String, Option<VolumeDefinition>>,
}

/// サービス定義
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub build: Option<BuildSpec>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub command: Option<StringOrList>,
    #[serde(default)]
    pub entrypoint: Option<StringOrList>,
    #[serde(default)]
    pub environment: KeyValues,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub networks: ServiceNetworks,
    #[serde(default)]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub cap_add: Vec<String>,
    #[serde(default)]
    pub cap_drop: Vec<String>,
    #[serde(default)]
    pub labels: KeyValues,
    #[serde(default)]
    pub depends_on: DependsOn,
    #[serde(default)]
    pub healthcheck: Option<Healthcheck>,
    #[serde(default)]
    pub restart: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub tty: bool,
    #[serde(default)]
    pub stdin_open: bool,
    #[serde(default)]
    pub pull_policy: Option<String>,
}

/// `"echo hi"` または `["echo", "hi"]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    String(String),
    List(Vec<String>),
}

impl StringOrList {
    /// 文字列形式は空白で分割
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StringOrList::String(s) => s.split_whitespace().map(String::from).collect(),
            StringOrList::List(list) => list.clone(),
        }
    }
}

/// environment / labels / build.args で使われるマップまたは `KEY=VALUE` のリスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValues {
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
    List(Vec<String>),
}

impl Default for KeyValues {
    fn default() -> Self {
        KeyValues::Map(BTreeMap::new())
    }
}

impl KeyValues {
    /// 値のないキーは `None`
    pub fn to_map(&self) -> BTreeMap<String, Option<String>> {
        match self {
            KeyValues::Map(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().and_then(scalar_to_string)))
                .collect(),
            KeyValues::List(list) => list
                .iter()
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (entry.clone(), None),
                })
                .collect(),
        }
    }

    /// キーを設定（リスト形式はマップ形式に正規化される）
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let mut map: BTreeMap<String, Option<serde_yaml::Value>> = self
            .to_map()
            .into_iter()
            .map(|(k, v)| (k, v.map(serde_yaml::Value::String)))
            .collect();
        map.insert(key.into(), Some(serde_yaml::Value::String(value.into())));
        *self = KeyValues::Map(map);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.to_map().remove(key).flatten()
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        other => serde_yaml::to_string(other)
            .ok()
            .map(|s| s.trim_end().to_string()),
    }
}

/// `build: ./dir` または詳細形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSpec {
    Context(String),
    Full(BuildConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub dockerfile: Option<String>,
    #[serde(default)]
    pub args: KeyValues,
    #[serde(default)]
    pub target: Option<String>,
}

impl BuildSpec {
    pub fn config(&self) -> BuildConfig {
        match self {
            BuildSpec::Context(context) => BuildConfig {
                context: Some(context.clone()),
                ..Default::default()
            },
            BuildSpec::Full(config) => config.clone(),
        }
    }
}

/// ポート指定（短縮形・数値・詳細形式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    Number(u16),
    Short(String),
    Long(PortConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    pub target: u16,
    #[serde(default)]
    pub published: Option<PortNumber>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub host_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortNumber {
    Number(u16),
    String(String),
}

/// ボリューム指定（短縮形・詳細形式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeSpec {
    Short(String),
    Long(VolumeConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

/// サービスの所属ネットワーク
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceNetworks {
    List(Vec<String>),
    Map(BTreeMap<String, Option<ServiceNetworkConfig>>),
}

impl Default for ServiceNetworks {
    fn default() -> Self {
        ServiceNetworks::List(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceNetworkConfig {
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ServiceNetworks {
    pub fn names(&self) -> Vec<String> {
        match self {
            ServiceNetworks::List(list) => list.clone(),
            ServiceNetworks::Map(map) => map.keys().cloned().collect(),
        }
    }

    pub fn aliases(&self, network: &str) -> Vec<String> {
        match self {
            ServiceNetworks::List(_) => Vec::new(),
            ServiceNetworks::Map(map) => map
                .get(network)
                .and_then(|c| c.as_ref())
                .map(|c| c.aliases.clone())
                .unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ServiceNetworks::List(list) => list.is_empty(),
            ServiceNetworks::Map(map) => map.is_empty(),
        }
    }
}

/// `depends_on: [db]` または `depends_on: { db: { condition: ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    List(Vec<String>),
    Map(BTreeMap<String, serde_yaml::Value>),
}

impl Default for DependsOn {
    fn default() -> Self {
        DependsOn::List(Vec::new())
    }
}

impl DependsOn {
    pub fn names(&self) -> Vec<String> {
        match self {
            DependsOn::List(list) => list.clone(),
            DependsOn::Map(map) => map.keys().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Healthcheck {
    #[serde(default)]
    pub test: Option<StringOrList>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub retries: Option<i64>,
    #[serde(default)]
    pub start_period: Option<String>,
    #[serde(default)]
    pub disable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDefinition {
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeDefinition {
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub name: Option<String>,
}
