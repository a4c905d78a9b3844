#![doc = r#"
# spark-minissl

## 设计动机（Why）
- **宿主掌控 IO**：服务端自己管理套接字与事件循环，TLS 层只在内存中把“收到的密文”折算为“可用的明文”，
  再把“待发的明文”折算为“可发送的密文”，从不阻塞、从不触碰网络；
- **可替换引擎**：记录层只依赖 [`TlsEngine`] 能力契约，默认实现基于 `rustls`，加密后端可在原生
  AWS-LC 与可移植的 `ring` 之间选择，原生后端失败时自动回退；
- **热更新**：[`MiniSslContext`] 依托 `ArcSwap` 替换证书，不影响存量连接。

## 核心契约（What）
- [`Connection`]：单会话记录层，公开 `inject`/`read`/`write`/`extract` 四个非阻塞操作；
  `Ok(None)` 表示“暂时没有数据”，错误意味着连接必须关闭；
- [`GrowableBuffer`]：带 `position`/`limit` 游标的可增长缓冲，扩容保留已写字节；
- [`SslOptions`]/[`KeyMaterial`]：构造期配置，可直接从宿主的 TOML/JSON 配置反序列化；
- [`MiniSslError`]：稳定错误码 + 粗粒度分类，读路径失败统一折叠为 `UnexpectedEof`。

## 实现策略（How）
- 每次引擎调用都经由统一的运行器：目标缓冲溢出时按会话尺寸扩容重试，委托任务就地同步执行；
- `read` 在解密之后顺势推进握手，握手期间产出的密文暂存于出站缓冲，由下一次 `extract` 交付；
- `rustls` 引擎逐条记录喂入密文，从而把“半条记录”精确地报告为欠载。

## 风险与考量（Trade-offs）
- `write` 是单槽邮箱，未被 `extract` 取走的明文会被覆盖；
- `shutdown` 不发送 close_notify，`is_initializing` 恒为 `false`；
- 委托任务同步执行，CPU 密集的校验会直接体现在调用时延上。
"#]

mod backend;
mod buffer;
mod config;
mod connection;
mod constants;
mod context;
mod engine;
mod error;
mod handshake;
mod op;

pub use backend::{AwsLcBackend, BackendChoice, EngineBackend, RingBackend, select_backend};
pub use buffer::GrowableBuffer;
pub use config::{
    ClientAuth, KeyMaterial, ProtocolVersion, SslOptions, VERIFY_FORCE_PEER, VERIFY_PEER,
};
pub use connection::Connection;
pub use constants::{LibraryConstants, USE_NATIVE_ENV, library_constants};
pub use context::MiniSslContext;
pub use engine::{
    APPLICATION_BUFFER_SIZE, DelegatedTask, EngineResult, EngineStatus, HandshakeStatus,
    PACKET_BUFFER_SIZE, RustlsEngine, TlsEngine,
};
pub use error::{EngineError, ErrorCategory, MiniSslError};
