use crate::core::config::data::{path_display, Config};
use crate::core::config::defaults::DEFAULT_BASE_URL;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration ({}):", path_display(Config::get_config_path()));
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset, using {DEFAULT_BASE_URL})"),
        }
        match self.default_team {
            Some(team) => println!("  default-team: {team}"),
            None => println!("  default-team: (unset)"),
        }
        match self.timeout_secs {
            Some(secs) => println!("  timeout-secs: {secs}"),
            None => println!("  timeout-secs: (unset)"),
        }
    }
}
