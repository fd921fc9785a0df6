use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::events::UNKNOWN;

/// 从 User-Agent 推断的客户端信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub device_type: &'static str,
    pub browser: &'static str,
    pub version: String,
    pub os: &'static str,
}

impl ClientInfo {
    /// 写入上报 payload；客户端已自带的同名字段保持不变
    pub fn fill(&self, payload: &mut Map<String, Value>) {
        let fields = [
            ("device_type", self.device_type.to_string()),
            ("browser", self.browser.to_string()),
            ("version", self.version.clone()),
            ("os", self.os.to_string()),
        ];
        for (key, value) in fields {
            payload
                .entry(key)
                .or_insert_with(|| Value::String(value));
        }
    }
}

fn version_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(Edg|Edge|Chrome|Firefox|Version)/(\d+)").ok())
        .as_ref()
}

/// 解析 User-Agent 字符串
///
/// 只区分设备大类、主流浏览器及其主版本号、操作系统。
pub fn parse(user_agent: &str) -> ClientInfo {
    let lower = user_agent.to_ascii_lowercase();
    let device_type = if lower.contains("ipad") || lower.contains("tablet") {
        "tablet"
    } else if ["mobile", "android", "iphone"].iter().any(|k| lower.contains(k)) {
        "mobile"
    } else {
        "desktop"
    };

    // Edge 与 Chrome 的 UA 都带 "Chrome/"，Chrome 又都带 "Safari/"，因此按此顺序判断
    let (browser, tokens): (&'static str, &[&str]) =
        if user_agent.contains("Edg/") || user_agent.contains("Edge/") {
            ("Edge", &["Edg", "Edge"])
        } else if user_agent.contains("Chrome/") {
            ("Chrome", &["Chrome"])
        } else if user_agent.contains("Firefox/") {
            ("Firefox", &["Firefox"])
        } else if user_agent.contains("Safari/") {
            ("Safari", &["Version"])
        } else {
            (UNKNOWN, &[])
        };
    let version = version_pattern()
        .and_then(|re| {
            re.captures_iter(user_agent)
                .find(|caps| tokens.contains(&&caps[1]))
                .map(|caps| caps[2].to_string())
        })
        .unwrap_or_else(|| UNKNOWN.to_string());

    let os = if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Android") {
        "Android"
    } else if ["iPhone", "iPad", "iOS"].iter().any(|k| user_agent.contains(k)) {
        "iOS"
    } else if user_agent.contains("Mac") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "Unknown"
    };

    ClientInfo {
        device_type,
        browser,
        version,
        os,
    }
}
