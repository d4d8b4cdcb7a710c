//! Student-record tools.
//!
//! Every tool is a thin adapter from JSON parameters to one
//! [`StudentStore`] query, so they share a single implementation keyed by
//! [`StudentQuery`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{arg_f64, arg_i64, arg_str, Tool};
use crate::data::StudentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StudentQuery {
    ById,
    ByName,
    ByDepartment,
    ByClass,
    Marks,
    AboveMarks,
    BelowMarks,
    Statistics,
    MarksRange,
    Total,
}

const ALL_QUERIES: [StudentQuery; 10] = [
    StudentQuery::ById,
    StudentQuery::ByName,
    StudentQuery::ByDepartment,
    StudentQuery::ByClass,
    StudentQuery::Marks,
    StudentQuery::AboveMarks,
    StudentQuery::BelowMarks,
    StudentQuery::Statistics,
    StudentQuery::MarksRange,
    StudentQuery::Total,
];

/// Build every student tool over one shared store.
pub(super) fn all(store: StudentStore) -> Vec<Arc<dyn Tool>> {
    ALL_QUERIES
        .iter()
        .map(|&query| {
            Arc::new(StudentTool {
                query,
                store: store.clone(),
            }) as Arc<dyn Tool>
        })
        .collect()
}

struct StudentTool {
    query: StudentQuery,
    store: StudentStore,
}

#[async_trait]
impl Tool for StudentTool {
    fn name(&self) -> &str {
        match self.query {
            StudentQuery::ById => "getStudentById",
            StudentQuery::ByName => "searchStudentsByName",
            StudentQuery::ByDepartment => "searchStudentsByDepartment",
            StudentQuery::ByClass => "searchStudentsByClass",
            StudentQuery::Marks => "getStudentMarks",
            StudentQuery::AboveMarks => "getStudentsAboveMarks",
            StudentQuery::BelowMarks => "getStudentsBelowMarks",
            StudentQuery::Statistics => "getStudentStatistics",
            StudentQuery::MarksRange => "searchStudentsByMarksRange",
            StudentQuery::Total => "getTotalStudents",
        }
    }

    fn description(&self) -> &str {
        match self.query {
            StudentQuery::ById => "Get a specific student by ID",
            StudentQuery::ByName => "Search students by name (partial, case-insensitive matching)",
            StudentQuery::ByDepartment => "Get all students in a department",
            StudentQuery::ByClass => "Get all students in a specific class year",
            StudentQuery::Marks => "Get marks for a specific student",
            StudentQuery::AboveMarks => "Get students with any mark above a threshold",
            StudentQuery::BelowMarks => "Get students with any mark below a threshold",
            StudentQuery::Statistics => {
                "Get overall statistics (counts by department, by class year, and in total)"
            }
            StudentQuery::MarksRange => "Get students with any mark in an inclusive range",
            StudentQuery::Total => "Get the total number of students",
        }
    }

    fn required_parameters(&self) -> &[&str] {
        match self.query {
            StudentQuery::ById => &["id"],
            StudentQuery::ByName => &["name"],
            StudentQuery::ByDepartment => &["department"],
            StudentQuery::ByClass => &["class_year"],
            StudentQuery::Marks => &["student_id"],
            StudentQuery::AboveMarks | StudentQuery::BelowMarks => &["marks"],
            StudentQuery::MarksRange => &["min", "max"],
            StudentQuery::Statistics | StudentQuery::Total => &[],
        }
    }

    fn parameters_hint(&self) -> &str {
        match self.query {
            StudentQuery::ById => "id: number",
            StudentQuery::ByName => "name: string",
            StudentQuery::ByDepartment => "department: string",
            StudentQuery::ByClass => "class_year: number",
            StudentQuery::Marks => "student_id: number",
            StudentQuery::AboveMarks | StudentQuery::BelowMarks => "marks: number",
            StudentQuery::MarksRange => "min: number, max: number",
            StudentQuery::Statistics | StudentQuery::Total => "",
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> anyhow::Result<Value> {
        let store = &self.store;
        let value = match self.query {
            StudentQuery::ById => {
                let id = arg_i64(args, "id")?;
                let student = store
                    .get_student(id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("No student with id {}", id))?;
                serde_json::to_value(student)?
            }
            StudentQuery::ByName => {
                let name = arg_str(args, "name")?.to_string();
                serde_json::to_value(store.search_by_name(name).await?)?
            }
            StudentQuery::ByDepartment => {
                let department = arg_str(args, "department")?.to_string();
                serde_json::to_value(store.search_by_department(department).await?)?
            }
            StudentQuery::ByClass => {
                serde_json::to_value(store.search_by_class(arg_i64(args, "class_year")?).await?)?
            }
            StudentQuery::Marks => {
                serde_json::to_value(store.student_marks(arg_i64(args, "student_id")?).await?)?
            }
            StudentQuery::AboveMarks => {
                serde_json::to_value(store.above_marks(arg_f64(args, "marks")?).await?)?
            }
            StudentQuery::BelowMarks => {
                serde_json::to_value(store.below_marks(arg_f64(args, "marks")?).await?)?
            }
            StudentQuery::Statistics => serde_json::to_value(store.statistics().await?)?,
            StudentQuery::MarksRange => {
                let min = arg_f64(args, "min")?;
                let max = arg_f64(args, "max")?;
                if min > max {
                    anyhow::bail!("'min' ({}) is greater than 'max' ({})", min, max);
                }
                serde_json::to_value(store.search_by_marks_range(min, max).await?)?
            }
            StudentQuery::Total => Value::from(store.total_students().await?),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ToolCall, ToolOutcome, ToolRegistry};
    use super::*;
    use serde_json::json;

    async fn registry() -> ToolRegistry {
        let store = StudentStore::in_memory().unwrap();
        store.seed_if_empty().await.unwrap();
        ToolRegistry::students(store)
    }

    fn call(tool: &str, params: Value) -> ToolCall {
        ToolCall {
            tool: tool.to_string(),
            parameters: params.as_object().cloned().unwrap_or_default(),
            reasoning: None,
        }
    }

    fn result(outcome: ToolOutcome) -> Value {
        match outcome {
            ToolOutcome::Result(v) => v,
            ToolOutcome::Error(e) => panic!("tool failed: {e}"),
        }
    }

    #[tokio::test]
    async fn registers_ten_tools_with_required_params() {
        let r = registry().await;
        assert_eq!(r.len(), 10);
        assert_eq!(
            r.lookup("searchStudentsByMarksRange").unwrap().required_parameters,
            vec!["min", "max"]
        );
        assert!(r.lookup("getTotalStudents").unwrap().required_parameters.is_empty());
    }

    #[tokio::test]
    async fn name_then_marks() {
        let r = registry().await;
        let found = result(
            r.execute(&call("searchStudentsByName", json!({"name": "Vivek"})))
                .await
                .outcome,
        );
        let id = found[0]["id"].clone();
        let marks = result(
            r.execute(&call("getStudentMarks", json!({"student_id": id})))
                .await
                .outcome,
        );
        assert_eq!(marks.as_array().unwrap().len(), 2);
        assert_eq!(marks[0]["name"], "Vivek Sharma");
    }

    #[tokio::test]
    async fn totals_and_statistics() {
        let r = registry().await;
        assert_eq!(
            result(r.execute(&call("getTotalStudents", json!({}))).await.outcome),
            json!(6)
        );
        let stats = result(r.execute(&call("getStudentStatistics", json!({}))).await.outcome);
        assert_eq!(stats["totalStudents"], 6);
    }

    #[tokio::test]
    async fn bad_values_become_operation_errors() {
        let r = registry().await;
        let missing = r.execute(&call("getStudentById", json!({"id": 404}))).await;
        assert!(missing.is_error());

        let wrong_type = r
            .execute(&call("getStudentsAboveMarks", json!({"marks": "lots"})))
            .await;
        assert!(wrong_type.is_error());

        let string_id = r.execute(&call("getStudentById", json!({"id": "1"}))).await;
        assert_eq!(result(string_id.outcome)["id"], 1);
    }
}
