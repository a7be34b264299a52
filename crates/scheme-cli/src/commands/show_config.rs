//! Show-config command implementation.

use crate::cli::{PresetArg, ShowConfigArgs};
use crate::error::Result;
use scheme_extractor::ExtractorConfig;

/// Execute the show-config command.
pub async fn execute_show_config(args: ShowConfigArgs) -> Result<()> {
    print!("{}", preset(args.preset).to_toml()?);
    Ok(())
}

/// Configuration for a named preset.
pub fn preset(preset: PresetArg) -> ExtractorConfig {
    match preset {
        PresetArg::Default => ExtractorConfig::default(),
        PresetArg::Aggressive => ExtractorConfig::aggressive(),
        PresetArg::Lenient => ExtractorConfig::lenient(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_round_trip_through_toml() {
        for arg in [PresetArg::Default, PresetArg::Aggressive, PresetArg::Lenient] {
            let config = preset(arg);
            let parsed = ExtractorConfig::from_toml(&config.to_toml().unwrap()).unwrap();
            assert_eq!(parsed, config);
        }
    }
}
