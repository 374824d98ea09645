use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A grading request: one submission checked against an ordered list of test cases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub test_cases: Vec<TestCase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    pub expected: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected: expected.into(),
        }
    }
}

/// Why a test case did not pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The build step failed or timed out; applied to every test case
    CompileError,
    /// Non-zero exit, timeout, or the run command could not be executed
    RuntimeError,
    /// The program ran cleanly but printed something else
    Mismatch,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::CompileError => write!(f, "compileError"),
            FailureKind::RuntimeError => write!(f, "runtimeError"),
            FailureKind::Mismatch => write!(f, "mismatch"),
        }
    }
}

/// Verdict for one test case, at the same index as its `TestCase` in the request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub input: String,
    pub expected: String,
    pub output: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

impl TestResult {
    pub fn passed(test_case: &TestCase, output: String) -> Self {
        Self {
            input: test_case.input.clone(),
            expected: test_case.expected.clone(),
            output,
            passed: true,
            failure_kind: None,
        }
    }

    pub fn failed(test_case: &TestCase, output: String, kind: FailureKind) -> Self {
        Self {
            input: test_case.input.clone(),
            expected: test_case.expected.clone(),
            output,
            passed: false,
            failure_kind: Some(kind),
        }
    }
}

/// Pass count over a result set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub total: usize,
}

impl Summary {
    pub fn of(results: &[TestResult]) -> Self {
        Self {
            passed: results.iter().filter(|r| r.passed).count(),
            total: results.len(),
        }
    }

    /// True only when there is at least one test and every test passed
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("code is required and must be a string")]
    MissingCode,

    #[error("code must not be empty")]
    EmptyCode,

    #[error("language must be a string")]
    InvalidLanguage,

    #[error("testCases is required and must be an array")]
    MissingTestCases,

    #[error("testCases[{index}] is malformed: {reason}")]
    InvalidTestCase { index: usize, reason: &'static str },

    #[error("timeoutMs must be a non-negative integer")]
    MalformedTimeout,

    #[error("timeoutMs must be between 1 and {max}")]
    InvalidTimeout { max: u64 },

    #[error("source code exceeds maximum size of {limit} bytes")]
    SourceTooLarge { limit: usize },

    #[error("testCases[{index}].input exceeds maximum size of {limit} bytes")]
    InputTooLarge { index: usize, limit: usize },
}

impl ExecutionRequest {
    /// Build a request from an untyped JSON body, reporting the first
    /// structural problem found.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let obj = body.as_object().ok_or(ValidationError::NotAnObject)?;

        let code = match obj.get("code") {
            Some(Value::String(code)) => code.clone(),
            _ => return Err(ValidationError::MissingCode),
        };
        if code.is_empty() {
            return Err(ValidationError::EmptyCode);
        }

        let language = match obj.get("language") {
            None | Some(Value::Null) => None,
            Some(Value::String(lang)) => Some(lang.clone()),
            Some(_) => return Err(ValidationError::InvalidLanguage),
        };

        let raw_cases = match obj.get("testCases") {
            Some(Value::Array(cases)) => cases,
            _ => return Err(ValidationError::MissingTestCases),
        };

        let mut test_cases = Vec::with_capacity(raw_cases.len());
        for (index, raw) in raw_cases.iter().enumerate() {
            let case = raw.as_object().ok_or(ValidationError::InvalidTestCase {
                index,
                reason: "expected an object",
            })?;
            let input = match case.get("input") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(input)) => input.clone(),
                Some(_) => {
                    return Err(ValidationError::InvalidTestCase {
                        index,
                        reason: "input must be a string",
                    })
                }
            };
            let expected = match case.get("expected") {
                Some(Value::String(expected)) => expected.clone(),
                _ => {
                    return Err(ValidationError::InvalidTestCase {
                        index,
                        reason: "expected is required and must be a string",
                    })
                }
            };
            test_cases.push(TestCase { input, expected });
        }

        let timeout_ms = match obj.get("timeoutMs") {
            None | Some(Value::Null) => None,
            Some(value) => match value.as_u64() {
                Some(ms) => Some(ms),
                None => return Err(ValidationError::MalformedTimeout),
            },
        };

        Ok(Self {
            code,
            language,
            test_cases,
            timeout_ms,
        })
    }

    /// Enforce size guardrails before any environment is touched
    pub fn check_limits(
        &self,
        max_source_bytes: usize,
        max_input_bytes: usize,
    ) -> Result<(), ValidationError> {
        if self.code.is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        if self.code.len() > max_source_bytes {
            return Err(ValidationError::SourceTooLarge {
                limit: max_source_bytes,
            });
        }
        if let Some((index, _)) = self
            .test_cases
            .iter()
            .enumerate()
            .find(|(_, tc)| tc.input.len() > max_input_bytes)
        {
            return Err(ValidationError::InputTooLarge {
                index,
                limit: max_input_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_full_request() {
        let body = json!({
            "code": "print(input())",
            "language": "Python",
            "testCases": [{"input": "5\n", "expected": "5"}],
            "timeoutMs": 2000
        });

        let req = ExecutionRequest::from_json(&body).unwrap();

        assert_eq!(req.code, "print(input())");
        assert_eq!(req.language.as_deref(), Some("Python"));
        assert_eq!(req.test_cases, vec![TestCase::new("5\n", "5")]);
        assert_eq!(req.timeout_ms, Some(2000));
    }

    #[test]
    fn test_from_json_defaults() {
        let body = json!({
            "code": "x",
            "testCases": [{"expected": "1"}, {"input": null, "expected": "2"}]
        });

        let req = ExecutionRequest::from_json(&body).unwrap();

        assert_eq!(req.language, None);
        assert_eq!(req.timeout_ms, None);
        assert_eq!(req.test_cases[0].input, "");
        assert_eq!(req.test_cases[1].input, "");
    }

    #[test]
    fn test_from_json_empty_test_cases_is_valid() {
        let req = ExecutionRequest::from_json(&json!({"code": "x", "testCases": []})).unwrap();
        assert!(req.test_cases.is_empty());
    }

    #[test]
    fn test_from_json_rejects_bad_code() {
        assert_eq!(
            ExecutionRequest::from_json(&json!({"testCases": []})),
            Err(ValidationError::MissingCode)
        );
        assert_eq!(
            ExecutionRequest::from_json(&json!({"code": 42, "testCases": []})),
            Err(ValidationError::MissingCode)
        );
        assert_eq!(
            ExecutionRequest::from_json(&json!({"code": "", "testCases": []})),
            Err(ValidationError::EmptyCode)
        );
    }

    #[test]
    fn test_from_json_rejects_non_array_test_cases() {
        assert_eq!(
            ExecutionRequest::from_json(&json!({"code": "x", "testCases": "nope"})),
            Err(ValidationError::MissingTestCases)
        );
        assert_eq!(
            ExecutionRequest::from_json(&json!({"code": "x"})),
            Err(ValidationError::MissingTestCases)
        );
    }

    #[test]
    fn test_from_json_rejects_malformed_test_case() {
        let err = ExecutionRequest::from_json(&json!({
            "code": "x",
            "testCases": [{"input": "1", "expected": "1"}, {"input": "2"}]
        }))
        .unwrap_err();

        assert!(matches!(err, ValidationError::InvalidTestCase { index: 1, .. }));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert_eq!(
            ExecutionRequest::from_json(&json!([1, 2])),
            Err(ValidationError::NotAnObject)
        );
    }

    #[test]
    fn test_check_limits() {
        let req = ExecutionRequest {
            code: "abcd".to_string(),
            language: None,
            test_cases: vec![TestCase::new("12", "1"), TestCase::new("123456", "1")],
            timeout_ms: None,
        };

        assert!(req.check_limits(4, 6).is_ok());
        assert_eq!(
            req.check_limits(3, 6),
            Err(ValidationError::SourceTooLarge { limit: 3 })
        );
        assert_eq!(
            req.check_limits(4, 5),
            Err(ValidationError::InputTooLarge { index: 1, limit: 5 })
        );
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let tc = TestCase::new("1", "2");
        let failed = TestResult::failed(&tc, "boom".to_string(), FailureKind::RuntimeError);
        let passed = TestResult::passed(&tc, "2".to_string());

        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "input": "1",
                "expected": "2",
                "output": "boom",
                "passed": false,
                "failureKind": "runtimeError"
            })
        );
        assert!(serde_json::to_value(&passed)
            .unwrap()
            .get("failureKind")
            .is_none());
    }

    #[test]
    fn test_summary() {
        let tc = TestCase::new("", "x");
        let results = vec![
            TestResult::passed(&tc, "x".to_string()),
            TestResult::failed(&tc, "y".to_string(), FailureKind::Mismatch),
        ];

        let summary = Summary::of(&results);
        assert_eq!(summary, Summary { passed: 1, total: 2 });
        assert!(!summary.all_passed());
        assert!(!Summary::of(&[]).all_passed());
    }
}
