use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;
use rustls::{RootCertStore, ServerConfig, crypto::CryptoProvider, server::WebPkiClientVerifier};
use tracing::info;

use crate::{
    backend::{BackendChoice, select_backend},
    config::{ClientAuth, KeyMaterial, SslOptions, select_cipher_suites},
    connection::Connection,
    constants::library_constants,
    engine::RustlsEngine,
    error::{EngineError, MiniSslError},
};

/// 服务端 TLS 上下文：一次校验选项，多次产出连接。
///
/// # 设计动机（Why）
/// - 选项校验、后端选择与 `ServerConfig` 构建都属于构造期工作，失败应在接受首个连接之前暴露；
/// - 证书轮换不应打断已建立的会话：配置保存在 `ArcSwap` 中，[`reload`](Self::reload)
///   只影响之后创建的连接。
///
/// # 核心契约（What）
/// - [`server`](Self::server) 为每个被接受的会话创建独立的 [`Connection`]，连接持有创建时刻的配置快照；
/// - `reload` 构建失败时保留旧配置并返回错误；
/// - 上下文可廉价克隆，克隆体共享同一热更容器。
///
/// # 实现逻辑（How）
/// - 后端偏好取 `SslOptions::prefer_native_engine`，缺省时取进程常量中的环境开关；
/// - 协议版本、客户端认证与密码套件分别按 [`crate::config`] 中的规则折算为 `rustls` 参数；
/// - 密码套件筛选结果写回一份克隆的 `CryptoProvider`，客户端证书校验器使用同一 provider。
///
/// # 风险提示（Trade-offs & Gotchas）
/// - 后端在构造时确定，`reload` 不会重新选择后端；
/// - 高频 `reload` 会让多个旧配置因存量连接而暂存，内存峰值需结合连接数评估。
#[derive(Clone)]
pub struct MiniSslContext {
    options: Arc<SslOptions>,
    backend: BackendChoice,
    config: Arc<ArcSwap<ServerConfig>>,
}

impl MiniSslContext {
    pub fn new(options: SslOptions, keys: &KeyMaterial) -> Result<Self, MiniSslError> {
        let prefer_native = options
            .prefer_native_engine
            .unwrap_or_else(|| library_constants().native_engine_requested);
        let backend = select_backend(prefer_native)?;
        let config = build_server_config(&options, &backend.provider, keys)?;
        info!(
            backend = backend.name,
            protocols = ?options.enabled_protocols(),
            client_auth = ?options.client_auth(),
            "MiniSSL 上下文已就绪"
        );
        Ok(Self {
            options: Arc::new(options),
            backend,
            config: Arc::new(ArcSwap::from_pointee(config)),
        })
    }

    /// 为一个新接受的会话创建服务端连接。
    pub fn server(&self) -> Result<Connection, MiniSslError> {
        let engine = RustlsEngine::new(self.config.load_full()).map_err(|error| {
            MiniSslError::ConnectionFailed {
                source: EngineError::Protocol(error),
            }
        })?;
        Ok(Connection::new(Box::new(engine)))
    }

    /// 以新的密钥材料重建配置，并原子替换当前快照。
    pub fn reload(&self, keys: &KeyMaterial) -> Result<(), MiniSslError> {
        let config = build_server_config(&self.options, &self.backend.provider, keys)?;
        self.config.store(Arc::new(config));
        info!(backend = self.backend.name, "MiniSSL 配置已热更新");
        Ok(())
    }

    /// 当前配置快照；后续 `reload` 不会影响已取出的快照。
    pub fn snapshot(&self) -> Arc<ServerConfig> {
        self.config.load_full()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name
    }

    pub fn options(&self) -> &SslOptions {
        &self.options
    }
}

impl fmt::Debug for MiniSslContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniSslContext")
            .field("backend", &self.backend.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn build_server_config(
    options: &SslOptions,
    provider: &CryptoProvider,
    keys: &KeyMaterial,
) -> Result<ServerConfig, MiniSslError> {
    let cipher_suites =
        select_cipher_suites(options.ssl_cipher_list.as_deref(), &provider.cipher_suites)?;
    let provider = Arc::new(CryptoProvider {
        cipher_suites,
        ..provider.clone()
    });

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&options.rustls_versions())?;
    let builder = match options.client_auth() {
        ClientAuth::None => builder.with_no_client_auth(),
        mode => {
            let mut roots = RootCertStore::empty();
            for anchor in keys.trust_anchors() {
                roots.add(anchor.clone())?;
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider);
            let verifier = if mode == ClientAuth::Request {
                verifier.allow_unauthenticated().build()?
            } else {
                verifier.build()?
            };
            builder.with_client_cert_verifier(verifier)
        }
    };
    let config = builder.with_single_cert(keys.cert_chain.clone(), keys.private_key.clone_key())?;
    Ok(config)
}
