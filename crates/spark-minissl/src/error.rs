use std::{borrow::Cow, io};

use rustls::{AlertDescription, Error as RustlsError};
use thiserror::Error;

/// 记录层错误模型。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 区分四类失败：构造期配置错误、wrap/unwrap 期间的协议错误、读路径上的意外中断，
///   以及“数据不足”这一**非错误**信号（以 `Ok(None)` 表达，不进入本模块）；
/// - 为宿主提供稳定错误码与粗粒度分类，使其无需解析 `rustls` 细节即可决定关闭连接或告警。
///
/// ## 逻辑（How）
/// - [`EngineError`] 描述引擎能力层的失败，由 [`crate::engine::TlsEngine`] 与运行器返回；
/// - [`MiniSslError`] 是公开 API 的错误，按调用路径把 `EngineError` 包装为
///   `ConnectionFailed`（写出路径）或 `UnexpectedEof`（读取路径）；
/// - `categorize_rustls_error`/`alert_to_category` 将协议错误细分为认证类或完整性类。
///
/// ## 契约（What）
/// - 所有错误均为致命：记录层不做自动重试，溢出重试只发生在运行器内部；
/// - `code()` 返回的错误码在版本间保持稳定。
#[derive(Debug, Error)]
pub enum EngineError {
    /// 引擎在处理记录时检测到协议违规、解密失败或证书校验失败。
    #[error("TLS 协议错误: {0}")]
    Protocol(#[from] RustlsError),
    /// 向引擎投喂或从引擎提取字节时发生的 IO 层错误。
    #[error("TLS 引擎 IO 错误: {0}")]
    Io(#[from] io::Error),
    /// 委托任务（如证书链校验）执行失败。
    #[error("委托任务执行失败: {reason}")]
    Task { reason: Cow<'static, str> },
    /// 引擎上报的计数与传入区域不符，违反能力契约。
    #[error("TLS 引擎违反契约: {reason}")]
    Misbehaved { reason: Cow<'static, str> },
}

impl EngineError {
    pub fn task(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Task {
            reason: reason.into(),
        }
    }

    pub fn misbehaved(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Misbehaved {
            reason: reason.into(),
        }
    }

    /// 按失败原因给出粗粒度分类。
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Protocol(error) => categorize_rustls_error(error),
            EngineError::Io(_) | EngineError::Misbehaved { .. } => ErrorCategory::Internal,
            EngineError::Task { .. } => ErrorCategory::Authentication,
        }
    }
}

/// 公开 API 的错误类型。
#[derive(Debug, Error)]
pub enum MiniSslError {
    /// 配置项自身不合法（例如密码套件列表过滤后为空、要求客户端证书却没有信任锚）。
    #[error("TLS 配置无效: {reason}")]
    Config { reason: Cow<'static, str> },
    /// `rustls` 拒绝了由配置推导出的参数（证书与私钥不匹配、协议版本缺少套件等）。
    #[error("TLS 配置被引擎拒绝: {source}")]
    Tls {
        #[from]
        source: RustlsError,
    },
    /// 客户端证书校验器构建失败，通常是信任锚无效。
    #[error("客户端证书校验器构建失败: {source}")]
    ClientVerifier {
        #[from]
        source: rustls::server::VerifierBuilderError,
    },
    /// wrap/unwrap 期间引擎失败，连接不可继续使用。
    #[error("TLS 连接失败: {source}")]
    ConnectionFailed { source: EngineError },
    /// 读路径上的任何失败都被折叠为流意外结束，避免把半解密状态当作有效数据暴露。
    #[error("TLS 流意外结束: {source}")]
    UnexpectedEof { source: EngineError },
}

pub(crate) const CONFIG: &str = "spark.minissl.config_invalid";
pub(crate) const CONFIG_REJECTED: &str = "spark.minissl.config_rejected";
pub(crate) const VERIFIER: &str = "spark.minissl.client_verifier_invalid";
pub(crate) const CONNECTION_FAILED: &str = "spark.minissl.connection_failed";
pub(crate) const UNEXPECTED_EOF: &str = "spark.minissl.unexpected_eof";

impl MiniSslError {
    pub(crate) fn config(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// 稳定错误码，供日志聚合与运维脚本使用。
    pub fn code(&self) -> &'static str {
        match self {
            MiniSslError::Config { .. } => CONFIG,
            MiniSslError::Tls { .. } => CONFIG_REJECTED,
            MiniSslError::ClientVerifier { .. } => VERIFIER,
            MiniSslError::ConnectionFailed { .. } => CONNECTION_FAILED,
            MiniSslError::UnexpectedEof { .. } => UNEXPECTED_EOF,
        }
    }

    /// 构造期错误之外的错误都意味着当前连接必须被丢弃。
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            MiniSslError::ConnectionFailed { .. } | MiniSslError::UnexpectedEof { .. }
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MiniSslError::Config { .. }
            | MiniSslError::Tls { .. }
            | MiniSslError::ClientVerifier { .. } => ErrorCategory::Configuration,
            MiniSslError::ConnectionFailed { source } | MiniSslError::UnexpectedEof { source } => {
                source.category()
            }
        }
    }
}

/// 错误的粗粒度分类，供宿主决定是否记录安全事件。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 构造期配置问题。
    Configuration,
    /// 对端证书缺失、无效或被拒绝。
    Authentication,
    /// 记录损坏、解密失败、握手消息违规等完整性问题。
    Integrity,
    /// 引擎内部或 IO 层故障。
    Internal,
}

fn categorize_rustls_error(error: &RustlsError) -> ErrorCategory {
    use RustlsError::*;
    match error {
        InappropriateMessage { .. }
        | InappropriateHandshakeMessage { .. }
        | InvalidMessage(_)
        | PeerMisbehaved(_)
        | DecryptError
        | EncryptError
        | PeerSentOversizedRecord
        | PeerIncompatible(_) => ErrorCategory::Integrity,
        NoCertificatesPresented
        | InvalidCertificate(_)
        | InvalidCertRevocationList(_)
        | UnsupportedNameType => ErrorCategory::Authentication,
        AlertReceived(alert) => alert_to_category(alert),
        _ => ErrorCategory::Internal,
    }
}

fn alert_to_category(alert: &AlertDescription) -> ErrorCategory {
    use AlertDescription::*;
    match alert {
        BadCertificate
        | UnsupportedCertificate
        | CertificateRevoked
        | CertificateExpired
        | CertificateUnknown
        | UnknownCA
        | AccessDenied
        | CertificateRequired => ErrorCategory::Authentication,
        DecodeError
        | DecryptError
        | HandshakeFailure
        | IllegalParameter
        | RecordOverflow
        | BadRecordMac
        | UnexpectedMessage
        | ProtocolVersion
        | InsufficientSecurity => ErrorCategory::Integrity,
        _ => ErrorCategory::Internal,
    }
}
