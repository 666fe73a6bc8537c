use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RoutesConfig {
    pub protected: Vec<String>,
    pub public: Vec<String>,
    pub login: String,
    pub home: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            protected: vec!["/dashboard".to_string()],
            public: vec!["/dashboard/preview".to_string()],
            login: "/login".to_string(),
            home: "/dashboard".to_string(),
        }
    }
}
