use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::{
    buffer::GrowableBuffer,
    context::MiniSslContext,
    engine::{HandshakeStatus, TlsEngine},
    error::{EngineError, MiniSslError},
    handshake::drive_handshake,
    op::{Operation, run_op},
};

/// 单个 TLS 会话的非阻塞记录层。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 宿主自行负责网络读写，记录层只在内存中完成“密文进、明文出、明文进、密文出”的折算；
/// - 每个被接受的网络会话对应一个 `Connection`，独占一个引擎实例与三条持久缓冲。
///
/// ## 逻辑（How）
/// - [`inject`](Self::inject) 仅追加入站密文，不触碰引擎；
/// - [`read`](Self::read) 执行一次 unwrap，再由握手驱动顺势推进，最后压缩或清空入站缓冲；
/// - [`write`](Self::write)/[`extract`](Self::extract) 组成单槽邮箱：写入替换待发明文，提取时按需 wrap；
/// - 三条缓冲的初始容量取自引擎的会话尺寸（记录长度上限与明文长度上限）。
///
/// ## 契约（What）
/// - 所有方法都是有界时间的内存/引擎操作，可在轮询循环中反复调用；委托任务会就地执行；
/// - `Ok(None)` 表示“暂时没有数据”，错误表示连接已不可用；
/// - 可变方法均要求 `&mut self`，调用方天然被迫串行化对同一连接的访问。
///
/// ## 风险与权衡（Trade-offs）
/// - `write` 不排队：尚未被 `extract` 完全取走的上一份明文会被丢弃；
/// - `shutdown` 不发送 close_notify，`is_initializing` 恒为 `false`，两者都是固定值。
pub struct Connection {
    engine: Box<dyn TlsEngine>,
    inbound_cipher: GrowableBuffer,
    outbound_plain: GrowableBuffer,
    outbound_cipher: GrowableBuffer,
}

impl Connection {
    /// 以已构造的引擎创建连接，缓冲容量取自引擎的会话尺寸。
    pub fn new(engine: Box<dyn TlsEngine>) -> Self {
        let packet_size = engine.packet_buffer_size();
        let application_size = engine.application_buffer_size();
        let mut outbound_plain = GrowableBuffer::with_capacity(application_size);
        outbound_plain.flip();
        Self {
            engine,
            inbound_cipher: GrowableBuffer::with_capacity(packet_size),
            outbound_plain,
            outbound_cipher: GrowableBuffer::with_capacity(packet_size),
        }
    }

    /// 为一个新接受的会话创建服务端连接。
    pub fn server(context: &MiniSslContext) -> Result<Self, MiniSslError> {
        context.server()
    }

    /// 追加从网络收到的原始密文。
    pub fn inject(&mut self, bytes: &[u8]) {
        self.inbound_cipher.put(bytes);
    }

    /// 解密一条入站记录并顺势推进握手。
    ///
    /// # 契约（What）
    /// - 入站缓冲为空时直接返回 `Ok(None)`，不调用引擎；
    /// - 纯握手流量或半条记录同样返回 `Ok(None)`，半条记录保留到下一次调用；
    /// - 任何失败都折叠为 [`MiniSslError::UnexpectedEof`]。
    pub fn read(&mut self) -> Result<Option<Bytes>, MiniSslError> {
        self.inbound_cipher.flip();
        if !self.inbound_cipher.has_remaining() {
            self.inbound_cipher.clear();
            return Ok(None);
        }

        let mut scratch_plain = GrowableBuffer::with_capacity(self.engine.application_buffer_size());
        self.unwrap_and_drive(&mut scratch_plain)
            .map_err(|source| MiniSslError::UnexpectedEof { source })?;

        if self.inbound_cipher.has_remaining() {
            self.inbound_cipher.compact();
        } else {
            self.inbound_cipher.clear();
        }
        Ok(scratch_plain.drain_to_bytes())
    }

    fn unwrap_and_drive(&mut self, scratch_plain: &mut GrowableBuffer) -> Result<(), EngineError> {
        run_op(
            &mut *self.engine,
            Operation::Unwrap,
            &mut self.inbound_cipher,
            scratch_plain,
        )?;
        drive_handshake(
            &mut *self.engine,
            &mut self.inbound_cipher,
            scratch_plain,
            &mut self.outbound_cipher,
        )
    }

    /// 用给定明文替换待发送载荷，返回写入的字节数。
    ///
    /// 单槽语义：上一份尚未被 [`extract`](Self::extract) 完全取走的明文会被直接丢弃，不做排队。
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.outbound_plain.has_remaining() {
            debug!(
                discarded = self.outbound_plain.remaining(),
                "上一份明文尚未取走，按单槽语义覆盖"
            );
        }
        self.outbound_plain = GrowableBuffer::from_slice(bytes);
        bytes.len()
    }

    /// 取出待发送的密文。
    ///
    /// 先返回上一次遗留的密文（例如握手消息）；否则在仍有明文时执行一次 wrap。
    /// 没有任何待发送数据时返回 `Ok(None)`。
    pub fn extract(&mut self) -> Result<Option<Bytes>, MiniSslError> {
        if let Some(pending) = self.outbound_cipher.drain_to_bytes() {
            return Ok(Some(pending));
        }
        if !self.outbound_plain.has_remaining() {
            return Ok(None);
        }

        self.outbound_cipher.clear();
        run_op(
            &mut *self.engine,
            Operation::Wrap,
            &mut self.outbound_plain,
            &mut self.outbound_cipher,
        )
        .map_err(|source| MiniSslError::ConnectionFailed { source })?;
        Ok(self.outbound_cipher.drain_to_bytes())
    }

    /// 对端首张证书的 DER 编码；对端未认证时返回 `None`。
    pub fn peer_certificate(&self) -> Option<Bytes> {
        self.engine
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|cert| Bytes::copy_from_slice(cert.as_ref()))
    }

    /// 固定返回 `true`，不发送 close_notify。
    pub fn shutdown(&mut self) -> bool {
        true
    }

    /// 固定返回 `false`。
    pub fn is_initializing(&self) -> bool {
        false
    }

    /// 引擎当前的握手诉求。
    pub fn handshake_status(&self) -> HandshakeStatus {
        self.engine.handshake_status()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("inbound_cipher", &self.inbound_cipher)
            .field("outbound_plain_remaining", &self.outbound_plain.remaining())
            .field("outbound_cipher", &self.outbound_cipher)
            .finish_non_exhaustive()
    }
}
