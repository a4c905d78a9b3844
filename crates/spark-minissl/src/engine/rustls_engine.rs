use std::{
    io::{self, Read, Write},
    sync::Arc,
};

use rustls::{InvalidMessage, ServerConfig, ServerConnection};
use rustls_pki_types::CertificateDer;

use super::{DelegatedTask, EngineResult, EngineStatus, HandshakeStatus, TlsEngine};
use crate::error::EngineError;

/// 单条记录可承载的最大明文长度（2^14）。
pub const APPLICATION_BUFFER_SIZE: usize = 16_384;

/// 单条记录在线路上的最大长度：记录头 + 明文上限 + 加密扩展上限。
pub const PACKET_BUFFER_SIZE: usize = RECORD_HEADER_LEN + MAX_CIPHERTEXT_LEN;

const RECORD_HEADER_LEN: usize = 5;
const MAX_CIPHERTEXT_LEN: usize = APPLICATION_BUFFER_SIZE + 2_048;
const CONTENT_TYPE_MIN: u8 = 20;
const CONTENT_TYPE_MAX: u8 = 24;

/// 以 `rustls::ServerConnection` 实现的引擎。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - `rustls` 的无 IO 接口是“整段读入、整段写出”的流式模型，而记录层需要逐条记录推进、
///   并能区分“目标区域不足”与“源数据不足”；
/// - 本类型在两者之间做语义折算，让运行器可以按溢出/欠载信号驱动重试。
///
/// ## 逻辑（How）
/// - `unwrap`：先交付 `rustls` 内部尚未取走的明文；随后只喂入 `src` 中**一条**完整记录，
///   处理后把明文拷入 `dst`，剩余明文放不下时报告 `BufferOverflow`；
/// - `wrap`：若 `rustls` 已有待发送的 TLS 字节（握手飞行、会话票据、告警），优先写出且不消费 `src`；
///   否则在握手完成后把 `src` 交给 `rustls` 加密并写出；
/// - `pending_plaintext`/`peer_closed` 缓存最近一次 `process_new_packets` 的 IO 状态。
///
/// ## 契约（What）
/// - 从不产生委托任务：`rustls` 的证书校验在处理记录时同步完成；
/// - 非法的记录头（未知内容类型、超长记录）直接报告协议错误，而不是无限等待更多字节。
pub struct RustlsEngine {
    conn: ServerConnection,
    pending_plaintext: usize,
    peer_closed: bool,
}

impl RustlsEngine {
    /// 基于共享配置创建服务端会话。
    pub fn new(config: Arc<ServerConfig>) -> Result<Self, rustls::Error> {
        Ok(Self::from_connection(ServerConnection::new(config)?))
    }

    pub fn from_connection(conn: ServerConnection) -> Self {
        Self {
            conn,
            pending_plaintext: 0,
            peer_closed: false,
        }
    }

    /// 底层会话的只读视图，便于查询 SNI、ALPN 与协商出的协议版本。
    pub fn connection(&self) -> &ServerConnection {
        &self.conn
    }

    fn deliver_plaintext(&mut self, dst: &mut [u8]) -> Result<usize, EngineError> {
        if self.pending_plaintext == 0 || dst.is_empty() {
            return Ok(0);
        }
        match self.conn.reader().read(dst) {
            Ok(0) => {
                self.pending_plaintext = 0;
                Ok(0)
            }
            Ok(read) => {
                self.pending_plaintext = self.pending_plaintext.saturating_sub(read);
                Ok(read)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                self.pending_plaintext = 0;
                Ok(0)
            }
            Err(err) => Err(EngineError::Io(err)),
        }
    }

    fn flush_tls(&mut self, dst: &mut [u8]) -> Result<usize, EngineError> {
        let capacity = dst.len();
        let mut out = dst;
        while self.conn.wants_write() {
            if self.conn.write_tls(&mut out)? == 0 {
                break;
            }
        }
        Ok(capacity - out.len())
    }

    fn flush_status(&self) -> EngineStatus {
        if self.conn.wants_write() {
            EngineStatus::BufferOverflow
        } else {
            EngineStatus::Ok
        }
    }
}

impl TlsEngine for RustlsEngine {
    fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, EngineError> {
        if self.conn.wants_write() {
            let produced = self.flush_tls(dst)?;
            return Ok(EngineResult::new(self.flush_status(), 0, produced));
        }
        if self.conn.is_handshaking() || src.is_empty() {
            return Ok(EngineResult::new(EngineStatus::Ok, 0, 0));
        }
        let consumed = self.conn.writer().write(src)?;
        let produced = self.flush_tls(dst)?;
        Ok(EngineResult::new(self.flush_status(), consumed, produced))
    }

    fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, EngineError> {
        let mut produced = self.deliver_plaintext(dst)?;
        if self.pending_plaintext > 0 {
            return Ok(EngineResult::new(EngineStatus::BufferOverflow, 0, produced));
        }
        if self.peer_closed {
            return Ok(EngineResult::new(EngineStatus::Closed, 0, produced));
        }

        let Some(record_len) = complete_record_len(src)? else {
            return Ok(EngineResult::new(
                EngineStatus::BufferUnderflow,
                0,
                produced,
            ));
        };
        let mut record = &src[..record_len];
        while !record.is_empty() {
            if self.conn.read_tls(&mut record)? == 0 {
                return Err(EngineError::misbehaved("rustls 拒绝接收完整记录"));
            }
        }
        let state = self.conn.process_new_packets()?;
        self.pending_plaintext = state.plaintext_bytes_to_read();
        self.peer_closed = state.peer_has_closed();

        produced += self.deliver_plaintext(&mut dst[produced..])?;
        let status = if self.pending_plaintext > 0 {
            EngineStatus::BufferOverflow
        } else if self.peer_closed {
            EngineStatus::Closed
        } else {
            EngineStatus::Ok
        };
        Ok(EngineResult::new(status, record_len, produced))
    }

    fn handshake_status(&self) -> HandshakeStatus {
        match (self.conn.is_handshaking(), self.conn.wants_write()) {
            (_, true) => HandshakeStatus::NeedWrap,
            (true, false) => HandshakeStatus::NeedUnwrap,
            (false, false) => HandshakeStatus::NotHandshaking,
        }
    }

    fn next_delegated_task(&mut self) -> Option<DelegatedTask> {
        None
    }

    fn packet_buffer_size(&self) -> usize {
        PACKET_BUFFER_SIZE
    }

    fn application_buffer_size(&self) -> usize {
        APPLICATION_BUFFER_SIZE
    }

    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.conn.peer_certificates()
    }
}

/// 若 `src` 以一条完整记录开头，返回该记录的总长度；记录尚未到齐时返回 `None`。
fn complete_record_len(src: &[u8]) -> Result<Option<usize>, EngineError> {
    let Some(header) = src.get(..RECORD_HEADER_LEN) else {
        return Ok(None);
    };
    if !(CONTENT_TYPE_MIN..=CONTENT_TYPE_MAX).contains(&header[0]) {
        return Err(rustls::Error::InvalidMessage(InvalidMessage::InvalidContentType).into());
    }
    let body_len = usize::from(u16::from_be_bytes([header[3], header[4]]));
    if body_len > MAX_CIPHERTEXT_LEN {
        return Err(rustls::Error::PeerSentOversizedRecord.into());
    }
    let total = RECORD_HEADER_LEN + body_len;
    Ok((src.len() >= total).then_some(total))
}
