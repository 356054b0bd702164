use serde::{Deserialize, Serialize};

/// Transport protocols an agent endpoint may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Jsonrpc,
    Grpc,
    Http,
}

/// Delivery-relevant capabilities advertised by an agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub push_notifications: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    ApiKey,
    Bearer,
    Basic,
}

/// How to authenticate outbound requests to an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentAuthentication {
    pub auth_type: AuthType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AgentAuthentication {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Bearer,
            api_key_name: None,
            token: Some(token.into()),
        }
    }

    /// Header name/value pairs for this scheme; empty when unauthenticated
    /// or misconfigured.
    pub fn headers(&self) -> Vec<(String, String)> {
        match (self.auth_type, &self.token) {
            (AuthType::ApiKey, Some(token)) => match &self.api_key_name {
                Some(name) => vec![(name.clone(), token.clone())],
                None => vec![],
            },
            (AuthType::Bearer, Some(token)) => {
                vec![("Authorization".into(), format!("Bearer {token}"))]
            }
            (AuthType::Basic, Some(token)) => {
                vec![("Authorization".into(), format!("Basic {token}"))]
            }
            _ => vec![],
        }
    }
}

/// Read-only agent descriptor resolved from the external registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    #[serde(default)]
    pub authentication: AgentAuthentication,
}

impl Agent {
    /// A minimal descriptor for an unauthenticated JSON-RPC agent.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            url: url.into(),
            transport: TransportKind::Jsonrpc,
            capabilities: AgentCapabilities::default(),
            authentication: AgentAuthentication::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_authentication(mut self, authentication: AgentAuthentication) -> Self {
        self.authentication = authentication;
        self
    }
}
