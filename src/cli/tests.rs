#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::config::{CacheBackend, LLMProvider};
    use crate::i18n::TargetLanguage;
    use clap::Parser;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    /// 写一个空配置文件，避免读到工作目录下的 ideascope.toml
    fn empty_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "verbose = false").unwrap();
        file
    }

    #[test]
    fn test_idea_is_required() {
        assert!(Args::try_parse_from(["ideascope"]).is_err());
    }

    #[test]
    fn test_args_default_values() {
        let args = Args::try_parse_from(["ideascope", "--idea", "idea.json"]).unwrap();

        assert_eq!(args.idea, PathBuf::from("idea.json"));
        assert!(args.idea_id.is_none());
        assert!(args.output_path.is_none());
        assert!(!args.verbose);
        assert!(!args.force_regenerate);
        assert!(!args.no_cache);
        assert!(!args.in_memory);
        assert!(!args.secondary_search);
    }

    #[test]
    fn test_args_short_options() {
        let args = Args::try_parse_from([
            "ideascope",
            "-i",
            "/ideas/note.json",
            "-o",
            "/test/output",
            "-c",
            "/test/ideascope.toml",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.idea, PathBuf::from("/ideas/note.json"));
        assert_eq!(args.output_path, Some(PathBuf::from("/test/output")));
        assert_eq!(args.config, Some(PathBuf::from("/test/ideascope.toml")));
        assert!(args.verbose);
    }

    #[test]
    fn test_into_config_applies_overrides() {
        let config_file = empty_config();
        let config_path = config_file.path().to_string_lossy().to_string();
        let args = Args::try_parse_from([
            "ideascope",
            "--idea",
            "idea.json",
            "--config",
            &config_path,
            "--output-path",
            "/tmp/reports",
            "--llm-provider",
            "deepseek",
            "--model-efficient",
            "small-model",
            "--target-language",
            "ja",
            "--max-retries",
            "4",
            "--secondary-search",
            "--no-cache",
            "--in-memory",
            "--force-regenerate",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.output_path, PathBuf::from("/tmp/reports"));
        assert_eq!(config.llm.provider, LLMProvider::DeepSeek);
        assert_eq!(config.llm.model_efficient, "small-model");
        assert_eq!(config.target_language, TargetLanguage::Japanese);
        assert_eq!(config.analysis.max_retries, 4);
        assert!(config.search.secondary.enabled);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.store.backend, CacheBackend::Memory);
        assert!(config.force_regenerate);
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let config_file = empty_config();
        let config_path = config_file.path().to_string_lossy().to_string();
        let args = Args::try_parse_from([
            "ideascope",
            "--idea",
            "idea.json",
            "--config",
            &config_path,
            "--llm-provider",
            "nope",
        ])
        .unwrap();

        assert!(args.into_config().is_err());
    }

    #[test]
    fn test_unknown_language_keeps_default() {
        let config_file = empty_config();
        let config_path = config_file.path().to_string_lossy().to_string();
        let args = Args::try_parse_from([
            "ideascope",
            "--idea",
            "idea.json",
            "--config",
            &config_path,
            "--target-language",
            "klingon",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.target_language, TargetLanguage::English);
    }
}
