//! SQLite-backed student records.
//!
//! All public operations are async; the synchronous `rusqlite` work runs on
//! the blocking pool behind a mutex-guarded connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid update: {0}")]
    Invalid(String),

    #[error("storage worker failed: {0}")]
    Worker(String),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    roll_number TEXT NOT NULL UNIQUE,
    department  TEXT NOT NULL,
    class_year  INTEGER NOT NULL,
    email       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS student_marks (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    subject    TEXT NOT NULL,
    marks      REAL NOT NULL,
    semester   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_student_marks_student ON student_marks(student_id);
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub roll_number: String,
    pub department: String,
    pub class_year: i64,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub roll_number: String,
    pub department: String,
    pub class_year: i64,
    pub email: String,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub roll_number: Option<String>,
    pub department: Option<String>,
    pub class_year: Option<i64>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkRecord {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub marks: f64,
    pub semester: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMarks {
    pub subject: String,
    pub marks: f64,
    pub semester: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarksUpdate {
    pub subject: Option<String>,
    pub marks: Option<f64>,
    pub semester: Option<i64>,
}

/// A marks row joined with the owning student's name and roll number.
#[derive(Debug, Clone, Serialize)]
pub struct StudentMarkRow {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub marks: f64,
    pub semester: i64,
    pub name: String,
    pub roll_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentClassCount {
    pub department: String,
    pub class_year: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentCount {
    pub department: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassYearCount {
    pub class_year: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatistics {
    pub by_department_and_class: Vec<DepartmentClassCount>,
    pub by_department: Vec<DepartmentCount>,
    pub by_class_year: Vec<ClassYearCount>,
    pub total_students: i64,
}

/// Shared handle to the student database.
#[derive(Clone)]
pub struct StudentStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for StudentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudentStore").finish_non_exhaustive()
    }
}

impl StudentStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Create a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Worker("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }

    /// Insert the demo records when the database holds no students.
    ///
    /// Returns the number of students inserted.
    pub async fn seed_if_empty(&self) -> Result<usize, StoreError> {
        self.call(|conn| {
            let existing: i64 =
                conn.query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))?;
            if existing > 0 {
                return Ok(0);
            }
            for (name, roll, dept, year, email, marks) in SEED_STUDENTS {
                conn.execute(
                    "INSERT INTO students (name, roll_number, department, class_year, email) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![name, roll, dept, year, email],
                )?;
                let id = conn.last_insert_rowid();
                for (subject, score, semester) in marks.iter() {
                    conn.execute(
                        "INSERT INTO student_marks (student_id, subject, marks, semester) \
                         VALUES (?1, ?2, ?3, ?4)",
                        params![id, subject, score, semester],
                    )?;
                }
            }
            Ok(SEED_STUDENTS.len())
        })
        .await
    }

    // ── Student CRUD ────────────────────────────────────────────────────────

    pub async fn create_student(&self, new: NewStudent) -> Result<Student, StoreError> {
        self.call(move |conn| {
            let student = conn.query_row(
                "INSERT INTO students (name, roll_number, department, class_year, email) \
                 VALUES (?1, ?2, ?3, ?4, ?5) RETURNING *",
                params![
                    new.name,
                    new.roll_number,
                    new.department,
                    new.class_year,
                    new.email
                ],
                map_student,
            )?;
            Ok(student)
        })
        .await
    }

    pub async fn get_student(&self, id: i64) -> Result<Option<Student>, StoreError> {
        self.call(move |conn| {
            Ok(conn
                .query_row("SELECT * FROM students WHERE id = ?1", [id], map_student)
                .optional()?)
        })
        .await
    }

    pub async fn update_student(
        &self,
        id: i64,
        update: StudentUpdate,
    ) -> Result<Student, StoreError> {
        let mut sets: Vec<(&'static str, SqlValue)> = Vec::new();
        if let Some(v) = update.name {
            sets.push(("name", v.into()));
        }
        if let Some(v) = update.roll_number {
            sets.push(("roll_number", v.into()));
        }
        if let Some(v) = update.department {
            sets.push(("department", v.into()));
        }
        if let Some(v) = update.class_year {
            sets.push(("class_year", v.into()));
        }
        if let Some(v) = update.email {
            sets.push(("email", v.into()));
        }
        self.call(move |conn| {
            let sql = build_update("students", &sets)?;
            let mut values: Vec<SqlValue> = sets.into_iter().map(|(_, v)| v).collect();
            values.push(id.into());
            conn.query_row(&sql, params_from_iter(values), map_student)
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("student {}", id)))
        })
        .await
    }

    pub async fn delete_student(&self, id: i64) -> Result<Student, StoreError> {
        self.call(move |conn| {
            conn.query_row(
                "DELETE FROM students WHERE id = ?1 RETURNING *",
                [id],
                map_student,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("student {}", id)))
        })
        .await
    }

    // ── Marks CRUD ──────────────────────────────────────────────────────────

    pub async fn add_marks(&self, student_id: i64, new: NewMarks) -> Result<MarkRecord, StoreError> {
        self.call(move |conn| {
            let exists: bool = conn
                .query_row("SELECT 1 FROM students WHERE id = ?1", [student_id], |_| {
                    Ok(true)
                })
                .optional()?
                .unwrap_or(false);
            if !exists {
                return Err(StoreError::NotFound(format!("student {}", student_id)));
            }
            Ok(conn.query_row(
                "INSERT INTO student_marks (student_id, subject, marks, semester) \
                 VALUES (?1, ?2, ?3, ?4) RETURNING *",
                params![student_id, new.subject, new.marks, new.semester],
                map_marks,
            )?)
        })
        .await
    }

    pub async fn update_marks(&self, id: i64, update: MarksUpdate) -> Result<MarkRecord, StoreError> {
        let mut sets: Vec<(&'static str, SqlValue)> = Vec::new();
        if let Some(v) = update.subject {
            sets.push(("subject", v.into()));
        }
        if let Some(v) = update.marks {
            sets.push(("marks", v.into()));
        }
        if let Some(v) = update.semester {
            sets.push(("semester", v.into()));
        }
        self.call(move |conn| {
            let sql = build_update("student_marks", &sets)?;
            let mut values: Vec<SqlValue> = sets.into_iter().map(|(_, v)| v).collect();
            values.push(id.into());
            conn.query_row(&sql, params_from_iter(values), map_marks)
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("marks {}", id)))
        })
        .await
    }

    pub async fn delete_marks(&self, id: i64) -> Result<MarkRecord, StoreError> {
        self.call(move |conn| {
            conn.query_row(
                "DELETE FROM student_marks WHERE id = ?1 RETURNING *",
                [id],
                map_marks,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("marks {}", id)))
        })
        .await
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Case-insensitive substring match on name.
    pub async fn search_by_name(&self, name: String) -> Result<Vec<Student>, StoreError> {
        self.call(move |conn| {
            let pattern = format!("%{}%", escape_like(&name));
            query_students(
                conn,
                "SELECT * FROM students WHERE name LIKE ?1 ESCAPE '\\' ORDER BY id",
                [pattern],
            )
        })
        .await
    }

    pub async fn search_by_department(&self, department: String) -> Result<Vec<Student>, StoreError> {
        self.call(move |conn| {
            query_students(
                conn,
                "SELECT * FROM students WHERE department = ?1 COLLATE NOCASE ORDER BY id",
                [department],
            )
        })
        .await
    }

    pub async fn search_by_class(&self, class_year: i64) -> Result<Vec<Student>, StoreError> {
        self.call(move |conn| {
            query_students(
                conn,
                "SELECT * FROM students WHERE class_year = ?1 ORDER BY id",
                [class_year],
            )
        })
        .await
    }

    /// Students with at least one mark inside `[min, max]`.
    pub async fn search_by_marks_range(&self, min: f64, max: f64) -> Result<Vec<Student>, StoreError> {
        self.call(move |conn| {
            query_students(
                conn,
                "SELECT DISTINCT s.* FROM students s \
                 JOIN student_marks sm ON s.id = sm.student_id \
                 WHERE sm.marks BETWEEN ?1 AND ?2 ORDER BY s.id",
                [min, max],
            )
        })
        .await
    }

    pub async fn above_marks(&self, marks: f64) -> Result<Vec<Student>, StoreError> {
        self.call(move |conn| {
            query_students(
                conn,
                "SELECT DISTINCT s.* FROM students s \
                 JOIN student_marks sm ON s.id = sm.student_id \
                 WHERE sm.marks > ?1 ORDER BY s.id",
                [marks],
            )
        })
        .await
    }

    pub async fn below_marks(&self, marks: f64) -> Result<Vec<Student>, StoreError> {
        self.call(move |conn| {
            query_students(
                conn,
                "SELECT DISTINCT s.* FROM students s \
                 JOIN student_marks sm ON s.id = sm.student_id \
                 WHERE sm.marks < ?1 ORDER BY s.id",
                [marks],
            )
        })
        .await
    }

    pub async fn student_marks(&self, student_id: i64) -> Result<Vec<StudentMarkRow>, StoreError> {
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT sm.id, sm.student_id, sm.subject, sm.marks, sm.semester, s.name, s.roll_number \
                 FROM student_marks sm JOIN students s ON s.id = sm.student_id \
                 WHERE sm.student_id = ?1 ORDER BY sm.semester, sm.id",
            )?;
            let rows = stmt
                .query_map([student_id], |r| {
                    Ok(StudentMarkRow {
                        id: r.get(0)?,
                        student_id: r.get(1)?,
                        subject: r.get(2)?,
                        marks: r.get(3)?,
                        semester: r.get(4)?,
                        name: r.get(5)?,
                        roll_number: r.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn statistics(&self) -> Result<StudentStatistics, StoreError> {
        self.call(|conn| {
            let by_department_and_class = conn
                .prepare(
                    "SELECT department, class_year, COUNT(*) FROM students \
                     GROUP BY department, class_year ORDER BY department, class_year",
                )?
                .query_map([], |r| {
                    Ok(DepartmentClassCount {
                        department: r.get(0)?,
                        class_year: r.get(1)?,
                        count: r.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let by_department = conn
                .prepare(
                    "SELECT department, COUNT(*) FROM students GROUP BY department ORDER BY department",
                )?
                .query_map([], |r| {
                    Ok(DepartmentCount {
                        department: r.get(0)?,
                        count: r.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let by_class_year = conn
                .prepare(
                    "SELECT class_year, COUNT(*) FROM students GROUP BY class_year ORDER BY class_year",
                )?
                .query_map([], |r| {
                    Ok(ClassYearCount {
                        class_year: r.get(0)?,
                        count: r.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let total_students = count_students(conn)?;

            Ok(StudentStatistics {
                by_department_and_class,
                by_department,
                by_class_year,
                total_students,
            })
        })
        .await
    }

    pub async fn total_students(&self) -> Result<i64, StoreError> {
        self.call(count_students).await
    }
}

fn count_students(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))?)
}

fn map_student(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get("id")?,
        name: r.get("name")?,
        roll_number: r.get("roll_number")?,
        department: r.get("department")?,
        class_year: r.get("class_year")?,
        email: r.get("email")?,
    })
}

fn map_marks(r: &Row<'_>) -> rusqlite::Result<MarkRecord> {
    Ok(MarkRecord {
        id: r.get("id")?,
        student_id: r.get("student_id")?,
        subject: r.get("subject")?,
        marks: r.get("marks")?,
        semester: r.get("semester")?,
    })
}

fn query_students<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Student>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_student)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `UPDATE <table> SET a = ?1, b = ?2 WHERE id = ?3 RETURNING *`
///
/// Column names come from the fixed lists in the update methods, never from input.
fn build_update(table: &str, sets: &[(&'static str, SqlValue)]) -> Result<String, StoreError> {
    if sets.is_empty() {
        return Err(StoreError::Invalid("no fields to update".to_string()));
    }
    let assignments = sets
        .iter()
        .enumerate()
        .map(|(i, (col, _))| format!("{} = ?{}", col, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "UPDATE {} SET {} WHERE id = ?{} RETURNING *",
        table,
        assignments,
        sets.len() + 1
    ))
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

type SeedMarks = &'static [(&'static str, f64, i64)];

const SEED_STUDENTS: &[(&str, &str, &str, i64, &str, SeedMarks)] = &[
    (
        "Vivek Sharma",
        "CS2021001",
        "Computer Science",
        3,
        "vivek.sharma@example.edu",
        &[("Data Structures", 88.0, 5), ("Operating Systems", 91.0, 5)],
    ),
    (
        "Ananya Gupta",
        "CS2022014",
        "Computer Science",
        2,
        "ananya.gupta@example.edu",
        &[("Discrete Mathematics", 76.0, 3), ("Digital Logic", 69.0, 3)],
    ),
    (
        "Rahul Verma",
        "EC2021007",
        "Electronics",
        3,
        "rahul.verma@example.edu",
        &[("Signals and Systems", 58.0, 5), ("Microprocessors", 64.0, 5)],
    ),
    (
        "Priya Nair",
        "EC2023003",
        "Electronics",
        1,
        "priya.nair@example.edu",
        &[("Basic Electronics", 93.0, 1)],
    ),
    (
        "Arjun Mehta",
        "ME2020021",
        "Mechanical",
        4,
        "arjun.mehta@example.edu",
        &[("Thermodynamics", 47.0, 7), ("Machine Design", 72.0, 7)],
    ),
    (
        "Sneha Iyer",
        "ME2022009",
        "Mechanical",
        2,
        "sneha.iyer@example.edu",
        &[("Fluid Mechanics", 81.0, 3)],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> StudentStore {
        let store = StudentStore::in_memory().unwrap();
        assert_eq!(store.seed_if_empty().await.unwrap(), 6);
        store
    }

    #[tokio::test]
    async fn seed_runs_once() {
        let store = seeded().await;
        assert_eq!(store.seed_if_empty().await.unwrap(), 0);
        assert_eq!(store.total_students().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn name_search_is_case_insensitive_substring() {
        let store = seeded().await;
        let found = store.search_by_name("vivek".to_string()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].roll_number, "CS2021001");

        let none = store.search_by_name("100%".to_string()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn marks_filters() {
        let store = seeded().await;
        let above: Vec<_> = store
            .above_marks(90.0)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(above, vec!["Vivek Sharma", "Priya Nair"]);

        let below = store.below_marks(50.0).await.unwrap();
        assert_eq!(below.len(), 1);
        assert_eq!(below[0].name, "Arjun Mehta");

        // Vivek has two marks in range but appears once.
        let ranged = store.search_by_marks_range(85.0, 95.0).await.unwrap();
        assert_eq!(ranged.len(), 2);
    }

    #[tokio::test]
    async fn department_and_class_search() {
        let store = seeded().await;
        assert_eq!(
            store
                .search_by_department("computer science".to_string())
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(store.search_by_class(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn statistics_group_counts() {
        let store = seeded().await;
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_students, 6);
        assert_eq!(stats.by_department.len(), 3);
        assert!(stats.by_department.iter().all(|d| d.count == 2));
        assert_eq!(stats.by_class_year.len(), 4);

        let v = serde_json::to_value(&stats).unwrap();
        assert!(v.get("byDepartmentAndClass").is_some());
        assert_eq!(v["totalStudents"], 6);
    }

    #[tokio::test]
    async fn student_crud_round_trip() {
        let store = StudentStore::in_memory().unwrap();
        let created = store
            .create_student(NewStudent {
                name: "Kavya Rao".to_string(),
                roll_number: "CE2024001".to_string(),
                department: "Civil".to_string(),
                class_year: 1,
                email: "kavya@example.edu".to_string(),
            })
            .await
            .unwrap();

        let updated = store
            .update_student(
                created.id,
                StudentUpdate {
                    class_year: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.class_year, 2);
        assert_eq!(updated.name, "Kavya Rao");

        let marks = store
            .add_marks(
                created.id,
                NewMarks {
                    subject: "Surveying".to_string(),
                    marks: 77.5,
                    semester: 2,
                },
            )
            .await
            .unwrap();
        let rows = store.student_marks(created.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Kavya Rao");

        let bumped = store
            .update_marks(
                marks.id,
                MarksUpdate {
                    marks: Some(80.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(bumped.marks, 80.0);

        store.delete_student(created.id).await.unwrap();
        assert!(store.get_student(created.id).await.unwrap().is_none());
        // Marks go with the student.
        assert!(matches!(
            store.delete_marks(marks.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_update_and_missing_rows_are_errors() {
        let store = seeded().await;
        assert!(matches!(
            store.update_student(1, StudentUpdate::default()).await,
            Err(StoreError::Invalid(_))
        ));
        assert!(matches!(
            store.delete_student(999).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store
                .add_marks(
                    999,
                    NewMarks {
                        subject: "X".to_string(),
                        marks: 1.0,
                        semester: 1
                    }
                )
                .await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.db");
        {
            let store = StudentStore::open(&path).unwrap();
            store.seed_if_empty().await.unwrap();
        }
        let reopened = StudentStore::open(&path).unwrap();
        assert_eq!(reopened.total_students().await.unwrap(), 6);
    }
}
