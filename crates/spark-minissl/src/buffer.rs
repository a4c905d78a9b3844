use bytes::Bytes;

/// `GrowableBuffer` 是记录层四条字节流共用的可增长缓冲。
///
/// # 设计动机（Why）
/// - 引擎的 wrap/unwrap 以“源区域 + 目标区域”的裸切片为输入，调用方必须自己维护读写游标；
/// - 入站密文可能只到达半条 TLS 记录，缓冲需要在两次调用之间保留未消费的尾部字节；
/// - 目标区域不足时引擎会报告溢出，缓冲必须能在不丢失已写数据的前提下扩容。
///
/// # 结构与模式（How）
/// - 单块连续存储 `storage`，辅以 `position` 与 `limit` 两个游标，语义与 `java.nio` 风格的字节缓冲一致；
/// - **填充模式**：`position` 指向写入末端，`[position, limit)` 为可写区域；
/// - **排空模式**：`position` 指向读取起点，`[position, limit)` 为未读数据；
/// - 模式切换只能经由 [`flip`](Self::flip)、[`compact`](Self::compact)、[`clear`](Self::clear)。
///
/// # 契约（What）
/// - 任意扩容都会保留 `[0, position)` 内的全部字节；
/// - [`drain_to_bytes`](Self::drain_to_bytes) 永不返回零长度结果，空缓冲返回 `None`；
/// - 调用方负责在两次公开调用之间不混用两种模式。
#[derive(Debug, Clone)]
pub struct GrowableBuffer {
    storage: Vec<u8>,
    position: usize,
    limit: usize,
}

impl GrowableBuffer {
    /// 创建处于填充模式的空缓冲。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity],
            position: 0,
            limit: capacity,
        }
    }

    /// 以给定内容创建处于排空模式的缓冲，内容即全部未读数据。
    pub fn from_slice(contents: &[u8]) -> Self {
        Self {
            storage: contents.to_vec(),
            position: 0,
            limit: contents.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// `[position, limit)` 的长度：填充模式下为剩余可写空间，排空模式下为未读字节数。
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// 当前区域的只读视图，供引擎作为源区域消费。
    pub fn remaining_slice(&self) -> &[u8] {
        &self.storage[self.position..self.limit]
    }

    /// 当前区域的可写视图，供引擎作为目标区域写入。
    pub fn remaining_slice_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.position..self.limit]
    }

    /// 推进游标，表示当前区域的前 `count` 字节已被消费或写入。
    ///
    /// # Panics
    /// `count` 超过 [`remaining`](Self::remaining) 时 panic；调用方需先校验引擎上报的计数。
    pub fn advance(&mut self, count: usize) {
        assert!(
            count <= self.remaining(),
            "GrowableBuffer::advance 越界：请求 {count}，剩余 {}",
            self.remaining()
        );
        self.position += count;
    }

    /// 追加字节；剩余空间不足时先把上限扩展 `bytes.len()`，保证新数据一定放得下。
    pub fn put(&mut self, bytes: &[u8]) {
        if self.remaining() < bytes.len() {
            self.resize(self.limit + bytes.len());
        }
        let end = self.position + bytes.len();
        self.storage[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }

    /// 调整可写上限。
    ///
    /// # 契约（What）
    /// - `new_capacity > capacity`：重新分配，复制 `[0, position)`，游标保持不变，`limit` 扩展到新容量；
    /// - 否则仅收缩/放宽 `limit`，底层存储不释放；`position` 超出新上限时被钳制到上限，
    ///   上限之外的字节不可再访问，但不会发生越界写入。
    pub fn resize(&mut self, new_capacity: usize) {
        if new_capacity > self.storage.len() {
            let mut grown = vec![0; new_capacity];
            grown[..self.position].copy_from_slice(&self.storage[..self.position]);
            self.storage = grown;
            self.limit = new_capacity;
        } else {
            self.limit = new_capacity;
            self.position = self.position.min(new_capacity);
        }
    }

    /// 从填充模式切换到排空模式。
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
    }

    /// 将未读尾部移动到起始位置并回到填充模式，用于跨调用保留半条记录。
    pub fn compact(&mut self) {
        let unread = self.remaining();
        self.storage.copy_within(self.position..self.limit, 0);
        self.position = unread;
        self.limit = self.storage.len();
    }

    /// 丢弃全部内容，回到空的填充模式。
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.storage.len();
    }

    /// 排空已写入的全部字节。
    ///
    /// 先 `flip`，若无数据则 `clear` 并返回 `None`；否则复制未读区间后 `clear`。
    /// 返回值要么为 `None`，要么为非空载荷，调用方据此区分“尚无数据”与“有数据”。
    pub fn drain_to_bytes(&mut self) -> Option<Bytes> {
        self.flip();
        if !self.has_remaining() {
            self.clear();
            return None;
        }
        let drained = Bytes::copy_from_slice(self.remaining_slice());
        self.clear();
        Some(drained)
    }
}
