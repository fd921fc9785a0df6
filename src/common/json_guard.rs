use thiserror::Error;

/// 上报请求体的结构限制
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub max_bytes: usize,
    pub max_depth: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BodyRejection {
    #[error("payload too large")]
    TooLarge,
    #[error("payload nested too deeply")]
    TooDeep,
    #[error("payload structure invalid")]
    Unbalanced,
}

/// 在交给 serde 解析之前对原始 JSON 做一次廉价扫描
///
/// 只检查长度与括号嵌套深度，字符串内部的括号会被跳过。
pub fn check_body(input: &[u8], limits: BodyLimits) -> Result<(), BodyRejection> {
    if input.len() > limits.max_bytes {
        return Err(BodyRejection::TooLarge);
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for &byte in input {
        if in_string {
            match (escape, byte) {
                (true, _) => escape = false,
                (false, b'\\') => escape = true,
                (false, b'"') => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > limits.max_depth {
                    return Err(BodyRejection::TooDeep);
                }
            }
            b'}' | b']' => {
                depth = depth.checked_sub(1).ok_or(BodyRejection::Unbalanced)?;
            }
            _ => {}
        }
    }

    Ok(())
}
