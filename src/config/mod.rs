use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Echo any request origin back (development posture)
    pub allow_any_origin: bool,
    pub cors_origins: Vec<String>,
}

/// Locations and credentials of the external collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    /// Blob storage bucket holding uploaded documents
    pub storage_bucket: String,
    pub qdrant_url: String,
    pub qdrant_api_key: String,
    pub vector_size: u32,
    pub crawler_service_url: String,
    pub crawler_service_key: String,
    pub embeddings_service_url: String,
    pub embeddings_service_key: String,
    pub parser_service_url: String,
    pub parser_service_key: String,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes = v.parse().unwrap_or(self.server.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ALLOW_ANY_ORIGIN") {
            self.security.allow_any_origin = v.parse().unwrap_or(self.security.allow_any_origin);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Collaborator overrides
        let services = &mut self.services;
        override_string("SUPABASE_URL", &mut services.supabase_url);
        override_string("SUPABASE_ANON_KEY", &mut services.supabase_anon_key);
        override_string("SUPABASE_SERVICE_ROLE_KEY", &mut services.supabase_service_role_key);
        override_string("STORAGE_BUCKET", &mut services.storage_bucket);
        override_string("QDRANT_URL", &mut services.qdrant_url);
        override_string("QDRANT_API_KEY", &mut services.qdrant_api_key);
        override_string("CRAWLER_SERVICE_URL", &mut services.crawler_service_url);
        override_string("CRAWLER_SERVICE_KEY", &mut services.crawler_service_key);
        override_string("EMBEDDINGS_SERVICE_URL", &mut services.embeddings_service_url);
        override_string("EMBEDDINGS_SERVICE_KEY", &mut services.embeddings_service_key);
        override_string("PARSER_SERVICE_URL", &mut services.parser_service_url);
        override_string("PARSER_SERVICE_KEY", &mut services.parser_service_key);
        if let Ok(v) = env::var("VECTOR_SIZE") {
            services.vector_size = v.parse().unwrap_or(services.vector_size);
        }
        if let Ok(v) = env::var("UPSTREAM_TIMEOUT_SECS") {
            services.request_timeout_secs = v.parse().unwrap_or(services.request_timeout_secs);
        }

        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8787,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                allow_any_origin: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:8787".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                    "http://127.0.0.1:8787".to_string(),
                ],
            },
            services: ServicesConfig::local(30),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 8787,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                allow_any_origin: false,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            services: ServicesConfig::local(15),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8787,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                allow_any_origin: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            services: ServicesConfig::local(10),
        }
    }
}

impl ServicesConfig {
    /// Local-stack defaults; real deployments override every URL and key
    fn local(request_timeout_secs: u64) -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            storage_bucket: "documents".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: String::new(),
            vector_size: 768,
            crawler_service_url: "http://localhost:8001".to_string(),
            crawler_service_key: String::new(),
            embeddings_service_url: "http://localhost:8003".to_string(),
            embeddings_service_key: String::new(),
            parser_service_url: "http://localhost:8002".to_string(),
            parser_service_key: String::new(),
            request_timeout_secs,
        }
    }

    /// Point every collaborator at one base URL (mock upstreams, single-host setups)
    pub fn single_host(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            supabase_url: base.clone(),
            supabase_anon_key: "anon-key".to_string(),
            supabase_service_role_key: "service-role-key".to_string(),
            storage_bucket: "documents".to_string(),
            qdrant_url: format!("{}/qdrant", base),
            qdrant_api_key: "qdrant-key".to_string(),
            vector_size: 768,
            crawler_service_url: format!("{}/crawler", base),
            crawler_service_key: "crawler-key".to_string(),
            embeddings_service_url: format!("{}/embedder", base),
            embeddings_service_key: "embedder-key".to_string(),
            parser_service_url: format!("{}/parser", base),
            parser_service_key: "parser-key".to_string(),
            request_timeout_secs: 5,
        }
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(v) = env::var(var) {
        *target = v;
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
