use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use rustls::crypto::{CryptoProvider, aws_lc_rs, ring};
use tracing::info;

use crate::error::MiniSslError;

/// 可插拔的加密后端。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 同一套记录层既要在“原生、更快”的实现上运行，也要在原生库缺失或初始化失败的环境中可用；
/// - 后端只负责交出一个经过自检的 [`CryptoProvider`]，会话状态机始终由 `rustls` 驱动。
///
/// ## 契约（What）
/// - `crypto_provider` 可以返回错误，也可能因底层库初始化失败而 panic，
///   调用方需要通过 [`select_backend`] 统一兜底；
/// - 实现必须是无状态或内部同步的，可在多个上下文之间共享。
pub trait EngineBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// 是否为原生实现；决定进程常量中是否报告库版本。
    fn is_native(&self) -> bool;

    fn crypto_provider(&self) -> Result<CryptoProvider, MiniSslError>;
}

/// 基于 AWS-LC 的原生后端。
#[derive(Clone, Copy, Debug, Default)]
pub struct AwsLcBackend;

impl EngineBackend for AwsLcBackend {
    fn name(&self) -> &'static str {
        "aws-lc-rs"
    }

    fn is_native(&self) -> bool {
        true
    }

    fn crypto_provider(&self) -> Result<CryptoProvider, MiniSslError> {
        self_check(aws_lc_rs::default_provider(), self.name())
    }
}

/// 基于 `ring` 的可移植后端，作为回退目标。
#[derive(Clone, Copy, Debug, Default)]
pub struct RingBackend;

impl EngineBackend for RingBackend {
    fn name(&self) -> &'static str {
        "ring"
    }

    fn is_native(&self) -> bool {
        false
    }

    fn crypto_provider(&self) -> Result<CryptoProvider, MiniSslError> {
        self_check(ring::default_provider(), self.name())
    }
}

/// 抽取一次随机数，确认底层库确实可用。
fn self_check(provider: CryptoProvider, name: &'static str) -> Result<CryptoProvider, MiniSslError> {
    let mut probe = [0u8; 16];
    provider
        .secure_random
        .fill(&mut probe)
        .map_err(|_| MiniSslError::config(format!("{name} 后端无法获取安全随机数")))?;
    Ok(provider)
}

/// 选定的后端及其加密能力。
#[derive(Clone, Debug)]
pub struct BackendChoice {
    pub name: &'static str,
    pub native: bool,
    pub provider: Arc<CryptoProvider>,
}

/// 按偏好选择后端：偏好原生时先尝试 [`AwsLcBackend`]，失败或 panic 时回退到 [`RingBackend`]。
pub fn select_backend(prefer_native: bool) -> Result<BackendChoice, MiniSslError> {
    let preferred = prefer_native.then_some(&AwsLcBackend as &dyn EngineBackend);
    select_with(preferred, &RingBackend)
}

pub(crate) fn select_with(
    preferred: Option<&dyn EngineBackend>,
    fallback: &dyn EngineBackend,
) -> Result<BackendChoice, MiniSslError> {
    if let Some(backend) = preferred {
        match panic::catch_unwind(AssertUnwindSafe(|| backend.crypto_provider())) {
            Ok(Ok(provider)) => {
                info!(backend = backend.name(), "已选用原生加密后端");
                return Ok(choice(backend, provider));
            }
            Ok(Err(error)) => {
                info!(
                    backend = backend.name(),
                    fallback = fallback.name(),
                    %error,
                    "原生加密后端不可用，回退到可移植后端"
                );
            }
            Err(_) => {
                info!(
                    backend = backend.name(),
                    fallback = fallback.name(),
                    "原生加密后端初始化时 panic，回退到可移植后端"
                );
            }
        }
    }
    let provider = fallback.crypto_provider()?;
    Ok(choice(fallback, provider))
}

fn choice(backend: &dyn EngineBackend, provider: CryptoProvider) -> BackendChoice {
    BackendChoice {
        name: backend.name(),
        native: backend.is_native(),
        provider: Arc::new(provider),
    }
}
