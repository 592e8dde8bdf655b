use uuid::Uuid;

use super::error::AttendanceError;
use super::model::{NewStudent, Student};
use super::store::AttendanceStore;

pub fn register_student<S>(store: &S, new: NewStudent) -> Result<Student, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    let student = new.into_student(Uuid::new_v4())?;
    store
        .insert_student(&student)
        .map_err(AttendanceError::store("insert student"))?;
    tracing::info!(student_id = %student.id, "student registered");
    Ok(student)
}

pub fn list_students<S>(store: &S) -> Result<Vec<Student>, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    store
        .list_students()
        .map_err(AttendanceError::store("list students"))
}
