use axum_helpers::JwtConfig;
use core_config::{AppInfo, FromEnv, app_info, server::ServerConfig};
use email::{MailerConfig, SmtpConfig};
use media::CloudinaryConfig;

// Import MongoDB config from the database library
use database::mongodb::MongoConfig;

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub mongodb: MongoConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    pub jwt: JwtConfig,
    pub cloudinary: CloudinaryConfig,
    pub mailer: MailerConfig,
    /// SMTP settings; None when SMTP_HOST is not set, which disables email
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let mongodb = MongoConfig::from_env()?;
        let server = ServerConfig::from_env()?;
        let jwt = JwtConfig::from_env()?;
        let cloudinary = CloudinaryConfig::from_env()?;
        let mailer = MailerConfig::from_env();

        let smtp = match SmtpConfig::from_env() {
            Ok(smtp) => Some(smtp),
            Err(e) => {
                tracing::warn!("SMTP not configured, emails disabled: {}", e);
                None
            }
        };

        Ok(Self {
            app: app_info!(),
            mongodb,
            server,
            environment,
            jwt,
            cloudinary,
            mailer,
            smtp,
        })
    }
}
