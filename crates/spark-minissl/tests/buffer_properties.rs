//! `GrowableBuffer` 性质测试。
//!
//! # 测试总览（Why）
//! - 任意顺序的写入、部分消费与压缩之后，排空得到的字节必须等于“写入总和减去已消费前缀”；
//! - 扩容必须保留 `[0, position)`，排空永不返回零长度载荷。

use proptest::prelude::*;
use spark_minissl::GrowableBuffer;

#[derive(Debug, Clone)]
enum Step {
    Put(Vec<u8>),
    /// 切到排空模式，消费至多 n 字节，再压缩回填充模式。
    ConsumeAndCompact(usize),
    Grow(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => prop::collection::vec(any::<u8>(), 0..64).prop_map(Step::Put),
        1 => (0usize..48).prop_map(Step::ConsumeAndCompact),
        1 => (0usize..96).prop_map(Step::Grow),
    ]
}

proptest! {
    #[test]
    fn prop_drain_returns_written_minus_consumed(
        initial in 0usize..32,
        steps in prop::collection::vec(step(), 0..24),
    ) {
        let mut buffer = GrowableBuffer::with_capacity(initial);
        let mut model: Vec<u8> = Vec::new();

        for step in &steps {
            match step {
                Step::Put(bytes) => {
                    buffer.put(bytes);
                    model.extend_from_slice(bytes);
                }
                Step::ConsumeAndCompact(count) => {
                    buffer.flip();
                    let consumed = (*count).min(buffer.remaining());
                    prop_assert_eq!(&buffer.remaining_slice()[..consumed], &model[..consumed]);
                    buffer.advance(consumed);
                    buffer.compact();
                    model.drain(..consumed);
                }
                Step::Grow(extra) => {
                    // 只做扩容：新容量不小于当前 position，已写字节不得丢失。
                    let target = buffer.position() + extra;
                    if target > buffer.capacity() {
                        buffer.resize(target);
                    }
                }
            }
            prop_assert_eq!(buffer.position(), model.len());
        }

        match buffer.drain_to_bytes() {
            Some(bytes) => {
                prop_assert!(!bytes.is_empty());
                prop_assert_eq!(&bytes[..], &model[..]);
            }
            None => prop_assert!(model.is_empty()),
        }
        prop_assert_eq!(buffer.position(), 0);
        prop_assert!(buffer.drain_to_bytes().is_none());
    }

    #[test]
    fn prop_shrinking_resize_clamps_position(
        data in prop::collection::vec(any::<u8>(), 1..64),
        cut in 0usize..64,
    ) {
        let mut buffer = GrowableBuffer::with_capacity(data.len());
        buffer.put(&data);
        buffer.resize(cut);
        prop_assert_eq!(buffer.position(), cut.min(data.len()));
        prop_assert_eq!(buffer.limit(), cut);
        let expected = &data[..cut.min(data.len())];
        match buffer.drain_to_bytes() {
            Some(bytes) => prop_assert_eq!(&bytes[..], expected),
            None => prop_assert!(expected.is_empty()),
        }
    }
}
