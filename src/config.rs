use url::Url;

/// Client configuration shared by the HTTP layer and the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub app_lang: String,

    /// Origin of the dashboard API, e.g. `https://rsdd.example.edu/api/`.
    pub base_url: Url,

    /// Path of the persisted session (tokens and cached user).
    pub session_file: String,

    /// Path of the persisted notes and notifications.
    pub data_file: String,

    pub user_agent: String,
}

impl Config {
    /// Default file for the persisted session state.
    pub const DEFAULT_SESSION_FILE: &'static str = "session.json";

    /// Default file for the local notes and notification collections.
    pub const DEFAULT_DATA_FILE: &'static str = "remdash.json";

    #[must_use]
    pub fn new(base_url: Url) -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let app_lang = "en".to_owned();

        // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
            || app_lang.chars().count() != 2
            || app_lang.contains(illegal_chars)
        {
            panic!(
                "application name, version and/or language invalid (\"{app_name}\"; \"{app_version}\"; \"{app_lang}\")"
            );
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));
        if os_name.is_empty()
            || os_name.contains(illegal_chars)
            || os_version.is_empty()
            || os_version.contains(illegal_chars)
        {
            panic!("os name and/or version invalid (\"{os_name}\"; \"{os_version}\")");
        }

        let user_agent =
            format!("{app_name}/{app_version} (Rust; {os_name}/{os_version}; Headless; {app_lang})");
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            app_lang,

            base_url,

            session_file: Self::DEFAULT_SESSION_FILE.to_owned(),
            data_file: Self::DEFAULT_DATA_FILE.to_owned(),

            user_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new(Url::parse("https://rsdd.example.edu/api/").expect("valid url"))
    }

    #[test]
    fn user_agent_contains_app_and_version() {
        let config = config();
        assert!(config.user_agent.starts_with(&format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )));
    }
}
