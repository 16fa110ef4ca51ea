use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// 并发上限 + 滑动窗口内的请求数上限
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    window: Duration,
    max_per_window: usize,
    issued: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, max_per_window: usize, window: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            window,
            max_per_window: max_per_window.max(1),
            issued: Mutex::new(VecDeque::new()),
        }
    }

    /// 每分钟 `requests_per_minute` 次
    pub fn per_minute(max_concurrent: usize, requests_per_minute: usize) -> Self {
        Self::new(max_concurrent, requests_per_minute, Duration::from_secs(60))
    }

    /// 等待并发名额与窗口配额，返回的permit释放时归还并发名额
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;

        loop {
            let wait = {
                let mut issued = self.issued.lock().await;
                let now = Instant::now();
                while issued
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    issued.pop_front();
                }

                if issued.len() < self.max_per_window {
                    issued.push_back(now);
                    return Ok(permit);
                }

                match issued.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };

            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
