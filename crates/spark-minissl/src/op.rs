use tracing::trace;

use crate::{
    buffer::GrowableBuffer,
    engine::{EngineResult, EngineStatus, HandshakeStatus, TlsEngine},
    error::EngineError,
};

/// 引擎操作方向。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// 明文 → 密文。
    Wrap,
    /// 密文 → 明文。
    Unwrap,
}

/// 对引擎执行一次 wrap/unwrap，并处理溢出扩容与委托任务。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 引擎只报告“目标太小/源不足/完成/已关闭”，真正的扩容与重试策略必须由调用方承担；
/// - 把这套重试循环集中在一个函数里，握手驱动与四个公开操作都复用同一语义。
///
/// ## 逻辑（How）
/// 1. 以 `src`/`dst` 当前区域调用引擎，并按上报的计数推进两侧游标；
/// 2. `BufferOverflow`：把 `dst` 扩展到 `max(packet, application) + dst.position()` 后重试，
///    扩容单调递增，循环必然收敛；
/// 3. `BufferUnderflow`/`Ok`/`Closed`：结束本次调用；
/// 4. 无论结果如何，若引擎此时处于 `NeedTask`，就地逐个执行委托任务直到取空。
///
/// ## 契约（What）
/// - 返回最后一次引擎调用的结果；`BufferUnderflow` 不是错误；
/// - 委托任务在当前线程同步执行，可能带来 CPU 密集的延迟尖峰，调用方应据此评估时延；
/// - 引擎上报的计数超出区域长度时返回 [`EngineError::Misbehaved`]，游标保持不变。
pub(crate) fn run_op(
    engine: &mut dyn TlsEngine,
    op: Operation,
    src: &mut GrowableBuffer,
    dst: &mut GrowableBuffer,
) -> Result<EngineResult, EngineError> {
    let result = loop {
        let result = match op {
            Operation::Wrap => engine.wrap(src.remaining_slice(), dst.remaining_slice_mut())?,
            Operation::Unwrap => engine.unwrap(src.remaining_slice(), dst.remaining_slice_mut())?,
        };
        if result.bytes_consumed > src.remaining() || result.bytes_produced > dst.remaining() {
            return Err(EngineError::misbehaved(format!(
                "{op:?} 上报 consumed={} produced={}，区域仅有 src={} dst={}",
                result.bytes_consumed,
                result.bytes_produced,
                src.remaining(),
                dst.remaining()
            )));
        }
        src.advance(result.bytes_consumed);
        dst.advance(result.bytes_produced);

        if result.status != EngineStatus::BufferOverflow {
            break result;
        }
        let session_size = engine
            .packet_buffer_size()
            .max(engine.application_buffer_size());
        let target = session_size + dst.position();
        trace!(?op, from = dst.capacity(), to = target, "目标缓冲溢出，扩容后重试");
        dst.resize(target);
    };

    if engine.handshake_status() == HandshakeStatus::NeedTask {
        run_delegated_tasks(engine)?;
    }
    Ok(result)
}

fn run_delegated_tasks(engine: &mut dyn TlsEngine) -> Result<(), EngineError> {
    let mut executed = 0usize;
    while let Some(task) = engine.next_delegated_task() {
        task()?;
        executed += 1;
    }
    trace!(executed, "委托任务已就地执行完毕");
    Ok(())
}
