//! TLS 引擎能力契约。
//!
//! # 设计动机（Why）
//! - 记录层只关心“给定源/目标字节区域执行一次 wrap 或 unwrap”这一能力，
//!   不关心证书、套件协商与记录加密如何实现；
//! - 将能力收敛为 [`TlsEngine`] trait，使记录层可以在 `rustls` 与测试替身之间自由切换，
//!   并允许宿主在构造期选择不同的加密后端。
//!
//! # 契约（What）
//! - `wrap`/`unwrap` 只读取 `src`、只写入 `dst`，并在 [`EngineResult`] 中如实上报消费与产出的字节数；
//! - 计数不得超过对应区域长度，否则运行器按 [`EngineError::Misbehaved`](crate::EngineError::Misbehaved) 处理；
//! - [`HandshakeStatus`] 是派生状态，每次操作后都需重新查询。

use rustls_pki_types::CertificateDer;

use crate::error::EngineError;

mod rustls_engine;

pub use self::rustls_engine::{APPLICATION_BUFFER_SIZE, PACKET_BUFFER_SIZE, RustlsEngine};

/// 单次 wrap/unwrap 的结果状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    /// 本次调用已完成。
    Ok,
    /// 目标区域过小，无法容纳引擎想要产出的数据。
    BufferOverflow,
    /// 源区域不包含一个完整的协议单元（例如半条 TLS 记录）。
    BufferUnderflow,
    /// 对端已关闭会话（收到 close_notify）。
    Closed,
}

/// 引擎对握手推进的当前诉求。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeStatus {
    NotHandshaking,
    /// 必须先产出密文（例如 ServerHello 飞行或会话票据）。
    NeedWrap,
    /// 必须先消费更多密文。
    NeedUnwrap,
    /// 有委托任务待同步执行。
    NeedTask,
    Finished,
}

/// 一次引擎操作的结果：状态 + 消费字节数 + 产出字节数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineResult {
    pub status: EngineStatus,
    pub bytes_consumed: usize,
    pub bytes_produced: usize,
}

impl EngineResult {
    pub fn new(status: EngineStatus, bytes_consumed: usize, bytes_produced: usize) -> Self {
        Self {
            status,
            bytes_consumed,
            bytes_produced,
        }
    }
}

/// 引擎要求调用方同步执行的计算单元，例如证书链校验。
pub type DelegatedTask = Box<dyn FnOnce() -> Result<(), EngineError> + Send>;

/// 记录层消费的 TLS 引擎能力。
///
/// 实现必须为 `Send`，以便连接在事件循环线程之间迁移；同一实例不会被并发调用。
pub trait TlsEngine: Send {
    /// 加密方向：`src` 为明文，`dst` 为密文。
    fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, EngineError>;

    /// 解密方向：`src` 为密文，`dst` 为明文。
    fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, EngineError>;

    fn handshake_status(&self) -> HandshakeStatus;

    /// 取出下一个委托任务；没有待执行任务时返回 `None`。
    fn next_delegated_task(&mut self) -> Option<DelegatedTask>;

    /// 单条 TLS 记录（含头部与加密开销）的最大长度。
    fn packet_buffer_size(&self) -> usize;

    /// 单条记录解密后明文的最大长度。
    fn application_buffer_size(&self) -> usize;

    /// 对端证书链；对端未认证时返回 `None`。
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]>;
}
