//! バッチ走査の外部制御（現在の識別子をスキップ / バッチ全体を終了）
//!
//! 外部（HTTPハンドラ、Ctrl-C、UIなど）から立てたフラグを、
//! 走査側がループ境界と長い待機の中でポーリングする。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct WalkControl {
    skip: Arc<AtomicBool>,
    exit: Arc<AtomicBool>,
}

impl WalkControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在処理中の識別子を中断して次へ進めるよう要求する
    pub fn request_skip(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    /// 走査を終了し、それまでの結果でエクスポートするよう要求する
    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::SeqCst);
    }

    /// スキップ要求を消費する（立っていれば true を返し、フラグを下ろす）
    pub fn take_skip(&self) -> bool {
        self.skip.swap(false, Ordering::SeqCst)
    }

    /// スキップ要求が立っているか（フラグは下ろさない）
    pub fn skip_requested(&self) -> bool {
        self.skip.load(Ordering::SeqCst)
    }

    pub fn clear_skip(&self) {
        self.skip.store(false, Ordering::SeqCst);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    /// 新しいバッチの開始時に両フラグを下ろす
    pub fn reset(&self) {
        self.skip.store(false, Ordering::SeqCst);
        self.exit.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_skip_consumes_flag() {
        let control = WalkControl::new();
        assert!(!control.take_skip());
        control.request_skip();
        assert!(control.take_skip());
        assert!(!control.take_skip());
    }

    #[test]
    fn test_clones_share_state() {
        let control = WalkControl::new();
        let remote = control.clone();
        remote.request_exit();
        assert!(control.exit_requested());

        control.reset();
        assert!(!remote.exit_requested());
    }

    #[test]
    fn test_flags_visible_across_threads() {
        let control = WalkControl::new();
        let remote = control.clone();
        std::thread::spawn(move || remote.request_skip())
            .join()
            .unwrap();
        assert!(control.take_skip());
    }
}
