//! 进程级只读常量。
//!
//! 首次访问时计算一次并缓存，之后所有上下文共享同一份结果。

use std::sync::OnceLock;

use crate::backend::{AwsLcBackend, RingBackend, select_with};

/// 控制是否优先使用原生加密后端的环境变量，真值为 `1`/`true`/`yes`/`on`（不区分大小写）。
pub const USE_NATIVE_ENV: &str = "SPARK_MINISSL_USE_NATIVE";

const UNKNOWN_VERSION: &str = "Unknown";

/// 宿主可查询的库能力描述。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryConstants {
    /// 恒为 `true`：SSLv3 不可用。
    pub no_ssl3: bool,
    /// 恒为 `true`：TLS1.0 不可用。
    pub no_tls1: bool,
    /// 进程环境是否要求原生后端。
    pub native_engine_requested: bool,
    /// 原生后端被请求且可用时为其库名，否则为 `"Unknown"`。
    pub library_version: &'static str,
    pub version: &'static str,
}

static CONSTANTS: OnceLock<LibraryConstants> = OnceLock::new();

/// 读取（必要时初始化）进程级常量。
pub fn library_constants() -> &'static LibraryConstants {
    CONSTANTS.get_or_init(|| {
        let flag = std::env::var(USE_NATIVE_ENV).ok();
        LibraryConstants::detect(flag.as_deref())
    })
}

impl LibraryConstants {
    pub(crate) fn detect(flag: Option<&str>) -> Self {
        let native_engine_requested = flag.is_some_and(is_truthy);
        let native_name = if native_engine_requested {
            select_with(Some(&AwsLcBackend), &RingBackend)
                .ok()
                .filter(|choice| choice.native)
                .map(|choice| choice.name)
        } else {
            None
        };
        let version = native_name.unwrap_or(UNKNOWN_VERSION);
        Self {
            no_ssl3: true,
            no_tls1: true,
            native_engine_requested,
            library_version: version,
            version,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
