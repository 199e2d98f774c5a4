//! Application Faults
//!
//! TigerStyle: Each unit really performs the failing operation; nothing is
//! a canned error string. Panics are caught at the unit boundary.

use std::any::Any;
use std::hint::black_box;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use async_trait::async_trait;

use super::catalog::{FaultContext, FaultUnit};
use super::error::{FaultError, FaultResult};
use crate::constants::{
    FAULT_ALLOCATION_BYTES, FAULT_BACKGROUND_DELAY_MS, FAULT_LOOP_TIMEOUT_MS,
    FAULT_NETWORK_TIMEOUT_MS,
};

const MISSING_FILE_PATH: &str = "/nonexistent/path/file.txt";
const MISSING_DATABASE_PATH: &str = "/nonexistent/database.db";
const MALFORMED_JSON: &str = r#"{"invalid": json, "missing": quotes}"#;

/// Run `f`, turning a panic into `FaultError::Panic`.
fn catch_panic<T>(f: impl FnOnce() -> T) -> FaultResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| FaultError::Panic {
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// =============================================================================
// Runtime panics
// =============================================================================

pub(super) struct DivisionByZero;

#[async_trait]
impl FaultUnit for DivisionByZero {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let divisor = black_box(0_i64);
        let quotient = catch_panic(|| 10 / divisor)?;
        Ok(format!("10 / {divisor} = {quotient}"))
    }
}

pub(super) struct NullPointer;

#[async_trait]
impl FaultUnit for NullPointer {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let data: Option<&str> = black_box(None);
        #[allow(clippy::unnecessary_literal_unwrap)]
        let value = catch_panic(|| data.unwrap().len())?;
        Ok(format!("value has {value} bytes"))
    }
}

pub(super) struct IndexOutOfBounds;

#[async_trait]
impl FaultUnit for IndexOutOfBounds {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let items = black_box(vec![1, 2, 3]);
        let index = black_box(10_usize);
        let item = catch_panic(|| items[index])?;
        Ok(format!("items[{index}] = {item}"))
    }
}

// =============================================================================
// Returned errors
// =============================================================================

pub(super) struct TypeError;

#[async_trait]
impl FaultUnit for TypeError {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let number: i64 = black_box("not_a_number").parse()?;
        Ok(format!("parsed {number}"))
    }
}

pub(super) struct InfiniteLoop;

#[async_trait]
impl FaultUnit for InfiniteLoop {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let spin = async {
            let mut iterations: u64 = 0;
            loop {
                iterations = iterations.wrapping_add(1);
                if iterations % 1024 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        };

        tokio::time::timeout(Duration::from_millis(FAULT_LOOP_TIMEOUT_MS), spin)
            .await
            .map_err(|_| FaultError::timeout("runaway loop", FAULT_LOOP_TIMEOUT_MS))?;
        Ok("loop finished".to_string())
    }
}

pub(super) struct MemoryError;

#[async_trait]
impl FaultUnit for MemoryError {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let mut buffer: Vec<u8> = Vec::new();
        buffer
            .try_reserve_exact(FAULT_ALLOCATION_BYTES)
            .map_err(|source| FaultError::Allocation {
                bytes: FAULT_ALLOCATION_BYTES,
                source,
            })?;
        Ok(format!("reserved {} bytes", buffer.capacity()))
    }
}

pub(super) struct FileNotFound;

#[async_trait]
impl FaultUnit for FileNotFound {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let content = tokio::fs::read_to_string(MISSING_FILE_PATH)
            .await
            .map_err(|e| FaultError::io("read /nonexistent/path/file.txt", e))?;
        Ok(format!("read {} bytes", content.len()))
    }
}

pub(super) struct JsonDecodeError;

#[async_trait]
impl FaultUnit for JsonDecodeError {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let value: serde_json::Value = serde_json::from_str(MALFORMED_JSON)
            .map_err(|e| FaultError::decode("parse JSON document", e))?;
        Ok(value.to_string())
    }
}

pub(super) struct NetworkTimeout;

#[async_trait]
impl FaultUnit for NetworkTimeout {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        // Accepts connections and never writes a response
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| FaultError::io("bind silent listener", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| FaultError::io("bind silent listener", e))?;
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(FAULT_NETWORK_TIMEOUT_MS))
            .build()?;
        let response = client.get(format!("http://{addr}/delay/10")).send().await;
        silent.abort();

        Ok(format!("status {}", response?.status()))
    }
}

pub(super) struct DatabaseError;

#[async_trait]
impl FaultUnit for DatabaseError {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let _file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(MISSING_DATABASE_PATH)
            .await
            .map_err(|e| FaultError::io("unable to open database file", e))?;
        Ok("database opened".to_string())
    }
}

pub(super) struct ValidationError;

#[async_trait]
impl FaultUnit for ValidationError {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let age: i64 = black_box(-5);
        let email = black_box("invalid-email");

        if age < 0 {
            return Err(FaultError::Validation(format!(
                "Invalid age: {age}. Age must be positive."
            )));
        }
        if !email.contains('@') {
            return Err(FaultError::Validation(format!(
                "Invalid email format: {email}"
            )));
        }
        Ok("record is valid".to_string())
    }
}

pub(super) struct CustomException;

#[async_trait]
impl FaultUnit for CustomException {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        Err(FaultError::Custom {
            code: "APP_ERR_001",
            message: "This is a custom application error for testing".to_string(),
        })
    }
}

pub(super) struct AsyncError;

#[async_trait]
impl FaultUnit for AsyncError {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(FAULT_BACKGROUND_DELAY_MS)).await;
            Err::<(), _>("Background task failed".to_string())
        });

        match task.await {
            Ok(Ok(())) => Ok("background task finished".to_string()),
            Ok(Err(message)) => Err(FaultError::Background(message)),
            Err(join) => Err(FaultError::Background(join.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    async fn induce(unit: impl FaultUnit) -> FaultError {
        unit.induce(&FaultContext::detached()).await.unwrap_err()
    }

    #[tokio::test]
    async fn test_panics_are_caught() {
        assert!(matches!(induce(DivisionByZero).await, FaultError::Panic { .. }));
        assert!(matches!(induce(NullPointer).await, FaultError::Panic { .. }));

        let err = induce(IndexOutOfBounds).await;
        assert_eq!(err.kind(), "panic");
        assert!(err.to_string().contains("index out of bounds"));
    }

    #[tokio::test]
    async fn test_returned_errors() {
        assert_eq!(induce(TypeError).await.kind(), "conversion");
        assert_eq!(induce(MemoryError).await.kind(), "allocation");
        assert_eq!(induce(FileNotFound).await.kind(), "not_found");
        assert_eq!(induce(JsonDecodeError).await.kind(), "decode");
        assert_eq!(induce(DatabaseError).await.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_validation_reports_age_first() {
        let err = induce(ValidationError).await;
        assert_eq!(err.to_string(), "Invalid age: -5. Age must be positive.");
    }

    #[tokio::test]
    async fn test_custom_error_code() {
        let err = induce(CustomException).await;
        assert!(err.to_string().starts_with("[APP_ERR_001]"));
    }

    #[tokio::test]
    async fn test_infinite_loop_is_cut_off() {
        let started = Instant::now();

        let err = induce(InfiniteLoop).await;

        assert!(matches!(err, FaultError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_millis(FAULT_LOOP_TIMEOUT_MS + 2_000));
    }

    #[tokio::test]
    async fn test_network_timeout() {
        let err = induce(NetworkTimeout).await;
        assert_eq!(err.kind(), "network_timeout");
    }

    #[tokio::test]
    async fn test_async_error_joins_task() {
        let started = Instant::now();

        let err = induce(AsyncError).await;

        assert_eq!(err.kind(), "background");
        assert!(started.elapsed() >= Duration::from_millis(FAULT_BACKGROUND_DELAY_MS));
    }
}
