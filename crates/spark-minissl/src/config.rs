//! 构造期配置：协议版本策略、客户端认证模式、密码套件列表与密钥材料。
//!
//! # 设计动机（Why）
//! - 宿主通常把 TLS 选项嵌在自己的 TOML/JSON 配置里，[`SslOptions`] 因此实现 `serde::Deserialize`
//!   并为每个字段提供默认值；
//! - 选项到 `rustls` 参数的折算集中在本模块，[`MiniSslContext`](crate::MiniSslContext) 只负责组装。
//!
//! # 契约（What）
//! - 协议策略：默认 TLS1.0/1.1/1.2；`no_tlsv1` 去掉 1.0；`no_tlsv1_1` **无论 `no_tlsv1` 取值**都只保留 1.2；
//!   `enable_tlsv1_3` 额外启用 1.3；
//! - `rustls` 不实现 TLS1.0/1.1，这两个版本在折算时被丢弃并记录 debug 日志；
//! - `verify_mode` 的 bit 1（强制）优先于 bit 0（请求）。

use std::fmt;

use rustls::{
    SupportedCipherSuite, SupportedProtocolVersion,
    version::{TLS12, TLS13},
};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use serde::Deserialize;
use tracing::debug;

use crate::error::MiniSslError;

/// `verify_mode` 中“请求客户端证书”的位。
pub const VERIFY_PEER: u32 = 0x1;
/// `verify_mode` 中“强制客户端证书”的位。
pub const VERIFY_FORCE_PEER: u32 = 0x2;

/// 宿主提供的 TLS 选项。
///
/// 所有字段都有默认值，空配置等价于 `SslOptions::default()`：TLS1.0–1.2、不校验客户端、
/// 使用后端的全部密码套件。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SslOptions {
    pub no_tlsv1: bool,
    pub no_tlsv1_1: bool,
    /// 额外启用 TLS1.3。
    pub enable_tlsv1_3: bool,
    /// bit 0 = 请求客户端证书，bit 1 = 强制客户端证书。
    pub verify_mode: u32,
    /// 逗号分隔的密码套件名；`None` 表示使用后端默认集合。
    pub ssl_cipher_list: Option<String>,
    /// 是否优先尝试原生加密后端；`None` 时取进程级常量。
    pub prefer_native_engine: Option<bool>,
}

/// TLS 协议版本。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    Tls1_0,
    Tls1_1,
    Tls1_2,
    Tls1_3,
}

impl ProtocolVersion {
    fn to_rustls(self) -> Option<&'static SupportedProtocolVersion> {
        match self {
            ProtocolVersion::Tls1_0 | ProtocolVersion::Tls1_1 => None,
            ProtocolVersion::Tls1_2 => Some(&TLS12),
            ProtocolVersion::Tls1_3 => Some(&TLS13),
        }
    }
}

/// 客户端证书校验模式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientAuth {
    None,
    /// 请求证书，但允许对端不提供。
    Request,
    /// 对端必须提供可校验的证书。
    Require,
}

impl SslOptions {
    /// 按策略计算启用的协议版本，结果按版本升序排列。
    pub fn enabled_protocols(&self) -> Vec<ProtocolVersion> {
        let mut protocols = if self.no_tlsv1_1 {
            vec![ProtocolVersion::Tls1_2]
        } else if self.no_tlsv1 {
            vec![ProtocolVersion::Tls1_1, ProtocolVersion::Tls1_2]
        } else {
            vec![
                ProtocolVersion::Tls1_0,
                ProtocolVersion::Tls1_1,
                ProtocolVersion::Tls1_2,
            ]
        };
        if self.enable_tlsv1_3 {
            protocols.push(ProtocolVersion::Tls1_3);
        }
        protocols
    }

    pub fn client_auth(&self) -> ClientAuth {
        if self.verify_mode & VERIFY_FORCE_PEER != 0 {
            ClientAuth::Require
        } else if self.verify_mode & VERIFY_PEER != 0 {
            ClientAuth::Request
        } else {
            ClientAuth::None
        }
    }

    pub(crate) fn rustls_versions(&self) -> Vec<&'static SupportedProtocolVersion> {
        self.enabled_protocols()
            .into_iter()
            .filter_map(|version| {
                let mapped = version.to_rustls();
                if mapped.is_none() {
                    debug!(?version, "rustls 不支持该协议版本，已忽略");
                }
                mapped
            })
            .collect()
    }
}

/// 根据逗号分隔的名称列表筛选密码套件。
///
/// # 契约（What）
/// - 名称两侧空白被裁剪，空条目被忽略；列表中没有任何名称时返回 `available` 全集；
/// - 名称同时接受 `rustls` 写法与 JSSE 的 TLS1.3 写法（`TLS_AES_128_GCM_SHA256`）；
/// - 未知名称跳过并记录 debug 日志；筛选结果为空时返回 [`MiniSslError::Config`]；
/// - 结果顺序遵循 `available`（即后端偏好），而非列表书写顺序。
pub(crate) fn select_cipher_suites(
    list: Option<&str>,
    available: &[SupportedCipherSuite],
) -> Result<Vec<SupportedCipherSuite>, MiniSslError> {
    let requested: Vec<String> = list
        .into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(canonical_suite_name)
        .collect();
    if requested.is_empty() {
        return Ok(available.to_vec());
    }

    for name in &requested {
        if !available.iter().any(|suite| suite_name(suite) == *name) {
            debug!(cipher = %name, "未知或当前后端不支持的密码套件，已跳过");
        }
    }
    let selected: Vec<SupportedCipherSuite> = available
        .iter()
        .filter(|suite| requested.contains(&suite_name(suite)))
        .copied()
        .collect();
    if selected.is_empty() {
        return Err(MiniSslError::config(format!(
            "ssl_cipher_list 中没有可用的密码套件: {}",
            requested.join(",")
        )));
    }
    Ok(selected)
}

fn suite_name(suite: &SupportedCipherSuite) -> String {
    format!("{:?}", suite.suite())
}

fn canonical_suite_name(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    match upper.strip_prefix("TLS_") {
        Some(rest) if rest.starts_with("AES_") || rest.starts_with("CHACHA20_") => {
            format!("TLS13_{rest}")
        }
        _ => upper,
    }
}

/// 服务端证书链、私钥与客户端证书信任锚。
///
/// 私钥与证书均已解码为 DER；未显式提供信任锚时，客户端证书按服务端自身的证书链校验。
pub struct KeyMaterial {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
    pub client_trust_anchors: Option<Vec<CertificateDer<'static>>>,
}

impl KeyMaterial {
    pub fn new(cert_chain: Vec<CertificateDer<'static>>, private_key: PrivateKeyDer<'static>) -> Self {
        Self {
            cert_chain,
            private_key,
            client_trust_anchors: None,
        }
    }

    pub fn with_client_trust_anchors(mut self, anchors: Vec<CertificateDer<'static>>) -> Self {
        self.client_trust_anchors = Some(anchors);
        self
    }

    /// 校验客户端证书时使用的信任锚。
    pub fn trust_anchors(&self) -> &[CertificateDer<'static>] {
        self.client_trust_anchors
            .as_deref()
            .unwrap_or(&self.cert_chain)
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        Self {
            cert_chain: self.cert_chain.clone(),
            private_key: self.private_key.clone_key(),
            client_trust_anchors: self.client_trust_anchors.clone(),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("cert_chain_len", &self.cert_chain.len())
            .field(
                "client_trust_anchors_len",
                &self.client_trust_anchors.as_ref().map(Vec::len),
            )
            .finish_non_exhaustive()
    }
}
