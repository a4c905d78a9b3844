use tracing::trace;

use crate::{
    buffer::GrowableBuffer,
    engine::{EngineStatus, HandshakeStatus, TlsEngine},
    error::EngineError,
    op::{Operation, run_op},
};

/// 在读路径上顺势推进握手。
///
/// # 逻辑（How）
/// - `NeedWrap`：以临时明文缓冲为源、出站密文缓冲为目标执行 wrap，产出的是引擎自己的握手消息；
/// - `NeedUnwrap`：继续消费入站密文；遇到 `BufferUnderflow` 说明必须等待更多网络字节，退出；
///   对端在握手中途关闭（`Closed`）同样退出；
/// - 其余状态（含已取空的 `NeedTask`）均不可在此推进，退出。
///
/// 每轮结束后重新查询状态。循环没有人为上限，依赖引擎状态向终态收敛。
pub(crate) fn drive_handshake(
    engine: &mut dyn TlsEngine,
    inbound_cipher: &mut GrowableBuffer,
    scratch_plain: &mut GrowableBuffer,
    outbound_cipher: &mut GrowableBuffer,
) -> Result<(), EngineError> {
    loop {
        let status = engine.handshake_status();
        trace!(?status, "握手推进");
        match status {
            HandshakeStatus::NeedWrap => {
                run_op(engine, Operation::Wrap, scratch_plain, outbound_cipher)?;
            }
            HandshakeStatus::NeedUnwrap => {
                let result = run_op(engine, Operation::Unwrap, inbound_cipher, scratch_plain)?;
                if matches!(
                    result.status,
                    EngineStatus::BufferUnderflow | EngineStatus::Closed
                ) {
                    return Ok(());
                }
            }
            _ => return Ok(()),
        }
    }
}
