//! 正文提取：HTML、PDF与纯文本

use scraper::{ElementRef, Html, Node, Selector};
use sha2::{Digest, Sha256};
use url::Url;

use crate::utils::text::{normalize_whitespace, truncate_chars};

/// 提取出的正文
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extracted {
    pub title: String,
    pub text: String,
    pub pages: Option<usize>,
}

/// 根据Content-Type与URL判定的内容类别
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Pdf,
    PlainText,
    Unsupported(String),
}

/// 不参与正文的元素，整棵子树跳过
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "button", "select", "template", "canvas",
];

/// 块级元素，前后换行
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
    "tr", "table", "blockquote", "pre", "br", "hr", "dd", "dt", "figcaption",
];

/// 候选的正文容器，按优先级排列
const CONTENT_ROOTS: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    "#content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-body",
];

/// 正文容器至少要有这么多字符才会被采用，否则退回body
const MIN_ROOT_CHARS: usize = 200;

pub fn detect_kind(content_type: Option<&str>, url: &Url) -> ContentKind {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_lowercase())
        .unwrap_or_default();

    if mime == "application/pdf" || url.path().to_lowercase().ends_with(".pdf") {
        return ContentKind::Pdf;
    }

    match mime.as_str() {
        "text/html" | "application/xhtml+xml" | "" => ContentKind::Html,
        "text/plain" => ContentKind::PlainText,
        other => ContentKind::Unsupported(other.to_string()),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// HTML正文提取：优先文章容器，去掉导航、脚本等噪声
pub fn extract_html(html: &str) -> Extracted {
    let document = Html::parse_document(html);
    let title = extract_title(&document).unwrap_or_default();

    let mut text = String::new();
    for css in CONTENT_ROOTS {
        let Some(sel) = selector(css) else { continue };
        if let Some(root) = document.select(&sel).next() {
            let candidate = element_text(root);
            if candidate.trim().chars().count() >= MIN_ROOT_CHARS {
                text = candidate;
                break;
            }
        }
    }

    if text.trim().is_empty() {
        let body = selector("body").and_then(|sel| document.select(&sel).next());
        text = match body {
            Some(body) => element_text(body),
            None => element_text(document.root_element()),
        };
    }

    Extracted {
        title,
        text,
        pages: None,
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let og_title = selector(r#"meta[property="og:title"]"#).and_then(|sel| {
        document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
    });

    let first_text = |css: &str| {
        selector(css).and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| el.text().collect::<Vec<_>>().join(" "))
        })
    };

    [first_text("title"), og_title, first_text("h1")]
        .into_iter()
        .flatten()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|t| !t.is_empty())
}

fn element_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(root, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let piece = text.trim();
                if piece.is_empty() {
                    continue;
                }
                if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                    out.push(' ');
                }
                out.push_str(piece);
            }
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let is_block = BLOCK_TAGS.contains(&name);
                if is_block {
                    out.push('\n');
                }
                collect_text(child_ref, out);
                if is_block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// 逐页提取PDF文本，CPU密集，调用方应放到阻塞线程池中执行
pub fn extract_pdf(bytes: &[u8]) -> Result<Extracted, String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| format!("PDF extraction failed: {}", e))?;
    Ok(Extracted {
        title: String::new(),
        pages: Some(pages.len()),
        text: pages.join("\n\n"),
    })
}

/// 规范化空白并截断到最大长度
pub fn finalize_text(raw: &str, max_chars: usize) -> String {
    let normalized = normalize_whitespace(raw);
    truncate_chars(&normalized, max_chars).trim_end().to_string()
}

/// 正文的SHA-256十六进制摘要，空正文返回 None
pub fn content_hash(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}
