use serde::{Deserialize, Serialize};

/// 分析报告的目标语言
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum TargetLanguage {
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "en")]
    #[default]
    English,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "ru")]
    Russian,
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLanguage::Chinese => write!(f, "zh"),
            TargetLanguage::English => write!(f, "en"),
            TargetLanguage::Japanese => write!(f, "ja"),
            TargetLanguage::Korean => write!(f, "ko"),
            TargetLanguage::German => write!(f, "de"),
            TargetLanguage::French => write!(f, "fr"),
            TargetLanguage::Russian => write!(f, "ru"),
        }
    }
}

impl std::str::FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zh" | "chinese" | "中文" => Ok(TargetLanguage::Chinese),
            "en" | "english" | "英文" => Ok(TargetLanguage::English),
            "ja" | "japanese" | "日本語" | "日文" => Ok(TargetLanguage::Japanese),
            "ko" | "korean" | "한국어" | "韩文" => Ok(TargetLanguage::Korean),
            "de" | "german" | "deutsch" | "德文" => Ok(TargetLanguage::German),
            "fr" | "french" | "français" | "法文" => Ok(TargetLanguage::French),
            "ru" | "russian" | "русский" | "俄文" => Ok(TargetLanguage::Russian),
            _ => Err(format!("Unknown target language: {}", s)),
        }
    }
}

impl TargetLanguage {
    /// 获取语言的描述性名称
    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::Chinese => "中文",
            TargetLanguage::English => "English",
            TargetLanguage::Japanese => "日本語",
            TargetLanguage::Korean => "한국어",
            TargetLanguage::German => "Deutsch",
            TargetLanguage::French => "Français",
            TargetLanguage::Russian => "Русский",
        }
    }

    /// 追加到每个分析节点system prompt末尾的语言指令，JSON字段名保持英文
    pub fn prompt_instruction(&self) -> &'static str {
        match self {
            TargetLanguage::Chinese => {
                "JSON中所有自由文本字段的取值请使用中文，字段名与枚举取值保持英文不变。"
            }
            TargetLanguage::English => {
                "Write every free-text value in the JSON in English. Keep field names and enum values exactly as specified."
            }
            TargetLanguage::Japanese => {
                "JSON内の自由記述の値はすべて日本語で記述してください。フィールド名と列挙値は指定どおり英語のままにしてください。"
            }
            TargetLanguage::Korean => {
                "JSON의 모든 자유 텍스트 값은 한국어로 작성해 주세요. 필드 이름과 열거형 값은 지정된 영어 그대로 유지해 주세요."
            }
            TargetLanguage::German => {
                "Schreiben Sie alle Freitextwerte im JSON auf Deutsch. Feldnamen und Aufzählungswerte bleiben unverändert auf Englisch."
            }
            TargetLanguage::French => {
                "Rédigez toutes les valeurs de texte libre du JSON en français. Les noms de champs et les valeurs d'énumération restent en anglais."
            }
            TargetLanguage::Russian => {
                "Пишите все свободные текстовые значения в JSON на русском языке. Имена полей и значения перечислений оставьте на английском."
            }
        }
    }
}
