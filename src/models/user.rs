use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Viewer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub organization: Organization,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(rename = "urlKey")]
    pub url_key: String,
}
