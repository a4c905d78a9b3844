//! 集成测试共享的证书与客户端泵送工具。
//!
//! # 设计动机（Why）
//! - 记录层不触碰网络，测试需要一个真实的 TLS 客户端在内存中与之对话；
//! - `rustls::ClientConnection` 同样是无 IO 接口，两端之间以 `Vec<u8>` 搬运字节即可模拟线路。
//!
//! # 行为描述（How）
//! - [`Identity::generate`] 以 `rcgen` 生成一次性自签证书；
//! - [`Pair::pump`] 执行一轮“客户端发送 → 服务端 `inject`/`read` → 服务端 `extract` → 客户端接收”；
//! - [`Pair::run_until_idle`] 连续泵送直到若干轮没有任何字节流动。

#![allow(dead_code)]

use std::{
    io::{self, Read, Write},
    sync::Arc,
};

use anyhow::{Context, bail};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use rustls::{
    ClientConfig, ClientConnection, RootCertStore, SupportedProtocolVersion, crypto::ring,
    pki_types::ServerName,
};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use spark_minissl::{Connection, HandshakeStatus, KeyMaterial};

const MAX_ROUNDS: usize = 64;
const IDLE_ROUNDS: usize = 3;

/// 一次性证书与私钥。
pub struct Identity {
    pub cert: CertificateDer<'static>,
    pub key: PrivateKeyDer<'static>,
}

impl Identity {
    pub fn generate(common_name: &str) -> anyhow::Result<Self> {
        let key_pair = KeyPair::generate().context("生成密钥对失败")?;
        let mut params = CertificateParams::new(vec![common_name.to_owned()])
            .context("构造证书参数失败")?;
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;
        let cert = params.self_signed(&key_pair).context("自签证书失败")?;
        let key = PrivateKeyDer::try_from(key_pair.serialize_der())
            .map_err(|err| anyhow::anyhow!("私钥编码失败: {err}"))?;
        Ok(Self {
            cert: cert.der().clone(),
            key,
        })
    }

    pub fn key_material(&self) -> KeyMaterial {
        KeyMaterial::new(vec![self.cert.clone()], self.key.clone_key())
    }
}

/// 构建信任 `server` 的客户端配置，可选携带客户端证书。
pub fn client_config(
    server: &Identity,
    versions: &[&'static SupportedProtocolVersion],
    client_identity: Option<&Identity>,
) -> anyhow::Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    roots.add(server.cert.clone())?;
    let builder = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_protocol_versions(versions)?
        .with_root_certificates(roots);
    let config = match client_identity {
        Some(identity) => {
            builder.with_client_auth_cert(vec![identity.cert.clone()], identity.key.clone_key())?
        }
        None => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

/// 内存中对接的客户端与服务端连接。
pub struct Pair {
    pub server: Connection,
    pub client: ClientConnection,
    /// 服务端 `read` 交付的全部明文。
    pub server_received: Vec<u8>,
    /// 客户端解密得到的全部明文。
    pub client_received: Vec<u8>,
}

impl Pair {
    pub fn new(server: Connection, config: Arc<ClientConfig>) -> anyhow::Result<Self> {
        let client = ClientConnection::new(config, ServerName::try_from("localhost")?)?;
        Ok(Self {
            server,
            client,
            server_received: Vec::new(),
            client_received: Vec::new(),
        })
    }

    /// 执行一轮双向搬运，返回本轮是否有字节流动。
    pub fn pump(&mut self) -> anyhow::Result<bool> {
        let mut moved = false;

        let mut wire = Vec::new();
        while self.client.wants_write() {
            self.client.write_tls(&mut wire)?;
        }
        if !wire.is_empty() {
            self.server.inject(&wire);
            moved = true;
        }

        while let Some(plaintext) = self.server.read()? {
            self.server_received.extend_from_slice(&plaintext);
            moved = true;
        }

        let mut cipher = Vec::new();
        while let Some(chunk) = self.server.extract()? {
            cipher.extend_from_slice(&chunk);
        }
        if !cipher.is_empty() {
            moved = true;
            self.deliver_to_client(&cipher)?;
        }
        Ok(moved)
    }

    fn deliver_to_client(&mut self, mut cipher: &[u8]) -> anyhow::Result<()> {
        while !cipher.is_empty() {
            self.client.read_tls(&mut cipher)?;
            self.client.process_new_packets()?;
            self.drain_client_plaintext()?;
        }
        Ok(())
    }

    fn drain_client_plaintext(&mut self) -> anyhow::Result<()> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.client.reader().read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(read) => self.client_received.extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// 连续泵送，直到连续若干轮没有字节流动。
    pub fn run_until_idle(&mut self) -> anyhow::Result<()> {
        let mut idle = 0;
        for _ in 0..MAX_ROUNDS {
            if self.pump()? {
                idle = 0;
            } else {
                idle += 1;
                if idle == IDLE_ROUNDS {
                    return Ok(());
                }
            }
        }
        bail!("{MAX_ROUNDS} 轮后仍有字节流动")
    }

    /// 泵送到双方都完成握手。
    pub fn handshake(&mut self) -> anyhow::Result<()> {
        self.run_until_idle()?;
        if self.client.is_handshaking() {
            bail!("客户端握手未完成");
        }
        if self.server.handshake_status() != HandshakeStatus::NotHandshaking {
            bail!("服务端握手未完成: {:?}", self.server.handshake_status());
        }
        Ok(())
    }

    /// 客户端发送明文并泵送到空闲。
    pub fn client_send(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        self.client.writer().write_all(payload)?;
        self.run_until_idle()
    }

    /// 服务端发送明文并泵送到空闲。
    pub fn server_send(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        let accepted = self.server.write(payload);
        if accepted != payload.len() {
            bail!("write 只接受了 {accepted}/{} 字节", payload.len());
        }
        self.run_until_idle()
    }
}
