#[cfg(test)]
mod tests {
    use crate::config::{
        AnalysisConfig, CacheBackend, CacheConfig, Config, FetcherConfig, LLMConfig, LLMProvider,
        ResearchConfig,
    };
    use crate::i18n::TargetLanguage;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.output_path, PathBuf::from("./ideascope.reports"));
        assert_eq!(config.internal_path, PathBuf::from("./.ideascope"));
        assert_eq!(config.target_language, TargetLanguage::English);
        assert!(!config.search.secondary.enabled);
        assert!(!config.force_regenerate);
        assert!(!config.verbose);
    }

    #[test]
    fn test_llm_provider_default() {
        let provider = LLMProvider::default();
        assert_eq!(provider, LLMProvider::OpenAI);
    }

    #[test]
    fn test_llm_provider_from_str() {
        assert_eq!("openai".parse::<LLMProvider>().unwrap(), LLMProvider::OpenAI);
        assert_eq!("Moonshot".parse::<LLMProvider>().unwrap(), LLMProvider::Moonshot);
        assert_eq!("deepseek".parse::<LLMProvider>().unwrap(), LLMProvider::DeepSeek);
        assert_eq!(
            "openrouter".parse::<LLMProvider>().unwrap(),
            LLMProvider::OpenRouter
        );
        assert_eq!(
            "anthropic".parse::<LLMProvider>().unwrap(),
            LLMProvider::Anthropic
        );
        assert_eq!("ollama".parse::<LLMProvider>().unwrap(), LLMProvider::Ollama);

        assert!("invalid".parse::<LLMProvider>().is_err());
    }

    #[test]
    fn test_llm_provider_display() {
        assert_eq!(LLMProvider::OpenAI.to_string(), "openai");
        assert_eq!(LLMProvider::DeepSeek.to_string(), "deepseek");
        assert_eq!(LLMProvider::Anthropic.to_string(), "anthropic");
        assert_eq!(LLMProvider::Ollama.to_string(), "ollama");
    }

    #[test]
    fn test_llm_config_default() {
        let config = LLMConfig::default();

        assert_eq!(config.provider, LLMProvider::OpenAI);
        // api_key may be empty if env var is not set
        assert!(!config.api_base_url.is_empty());
        assert!(!config.model_efficient.is_empty());
        assert!(!config.model_powerful.is_empty());
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_pipeline_defaults() {
        let fetcher = FetcherConfig::default();
        assert_eq!(fetcher.requests_per_minute, 60);
        assert_eq!(fetcher.max_concurrent, 5);
        assert_eq!(fetcher.timeout_seconds, 15);
        assert_eq!(fetcher.max_redirects, 5);
        assert_eq!(fetcher.max_content_chars, 50_000);

        let research = ResearchConfig::default();
        assert_eq!(research.max_urls, 20);
        assert_eq!(research.pack_document_chars, 10_000);
        assert_eq!(research.pack_ttl(), Duration::from_secs(7 * 24 * 3600));

        let analysis = AnalysisConfig::default();
        assert_eq!(analysis.max_retries, 2);
        assert_eq!(analysis.max_attempts(), 3);
        assert_eq!(analysis.context_documents, 8);
        assert_eq!(analysis.context_chars_per_document, 2500);
    }

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();

        assert!(config.enabled);
        assert_eq!(config.backend, CacheBackend::File);
        assert_eq!(config.cache_dir, PathBuf::from(".ideascope/cache"));
    }

    #[test]
    fn test_from_file_partial_sections() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ideascope.toml");

        let content = r#"
target_language = "zh"
verbose = true

[llm]
provider = "deepseek"
api_key = "sk-test"
model_efficient = "deepseek-chat"

[search.secondary]
enabled = true

[analysis]
max_retries = 4

[cache]
backend = "memory"
"#;
        std::fs::write(&config_path, content).unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.target_language, TargetLanguage::Chinese);
        assert!(config.verbose);
        assert_eq!(config.llm.provider, LLMProvider::DeepSeek);
        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.llm.model_efficient, "deepseek-chat");
        assert!(config.search.secondary.enabled);
        assert_eq!(config.analysis.max_retries, 4);
        assert_eq!(config.analysis.context_documents, 8);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.fetcher.max_concurrent, 5);
    }

    #[test]
    fn test_from_file_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        std::fs::write(&config_path, "[llm\nprovider = ").unwrap();

        assert!(Config::from_file(&config_path).is_err());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let missing = PathBuf::from("/nonexistent/ideascope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_huge_ttl_hours_saturate() {
        let research = ResearchConfig {
            pack_ttl_hours: u64::MAX,
            ..ResearchConfig::default()
        };
        assert_eq!(research.pack_ttl(), Duration::from_secs(u64::MAX));

        let analysis = AnalysisConfig {
            node_cache_ttl_hours: u64::MAX / 1000,
            ..AnalysisConfig::default()
        };
        assert_eq!(analysis.node_cache_ttl(), Duration::from_secs(u64::MAX));
    }
}
