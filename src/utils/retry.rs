//! 通用重试逻辑
//!
//! 被重试的操作自行判定每次失败是否可重试，重试结束后返回带尝试次数的结果，
//! 调用方据此区分“可重试的传输错误”与“终止性的校验错误”。

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 首次重试前的等待，之后每次翻倍
    pub base_delay: Duration,
    /// 单次等待上限
    pub max_delay: Duration,
    /// 是否叠加随机抖动
    pub jitter: bool,
}

impl RetryPolicy {
    /// 指数退避 + 抖动
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter: true,
        }
    }

    /// 立即重试，不等待
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// 第 `attempt` 次失败后（从1开始）的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if !self.jitter {
            return delay;
        }
        let jitter_ms = (delay.as_millis() as u64 / 2).max(1);
        delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

/// 单次失败的分类
#[derive(Debug)]
pub enum RetryDecision<E> {
    Retryable(E),
    Terminal(E),
}

/// 成功结果及消耗的尝试次数
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// 可重试错误耗尽了全部尝试次数
    Exhausted { error: E, attempts: u32 },
    /// 遇到不可重试的错误
    Terminal { error: E, attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Terminal { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_error(self) -> E {
        match self {
            RetryError::Exhausted { error, .. } | RetryError::Terminal { error, .. } => error,
        }
    }
}

/// 按策略执行操作，`operation` 接收当前尝试序号（从1开始）
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<Retried<T>, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RetryDecision<E>>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(RetryDecision::Terminal(error)) => {
                return Err(RetryError::Terminal {
                    error,
                    attempts: attempt,
                });
            }
            Err(RetryDecision::Retryable(error)) => {
                if attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted {
                        error,
                        attempts: attempt,
                    });
                }
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
