//! Demonstration records for the domain tools.
//!
//! Nothing here is real: every name, grade and payment is drawn at random
//! from fixed pools. Generators take the RNG and the current date so tests
//! can pin both.

use chrono::{NaiveDate, TimeDelta, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

/// Monthly tuition, in the school's currency.
pub const MONTHLY_TUITION: f64 = 600.0;

/// Grades below this need focus.
pub const FOCUS_THRESHOLD: f64 = 5.0;

pub const STUDENT_NAMES: [&str; 8] = [
    "João Silva",
    "Maria Santos",
    "Pedro Oliveira",
    "Ana Costa",
    "Carlos Souza",
    "Juliana Lima",
    "Rafael Alves",
    "Beatriz Rocha",
];

pub const TEACHER_NAMES: [&str; 8] = [
    "Prof. Silva",
    "Prof. Santos",
    "Prof. Oliveira",
    "Prof. Costa",
    "Prof. Souza",
    "Prof. Lima",
    "Prof. Alves",
    "Prof. Rocha",
];

pub const COURSE_NAMES: [&str; 12] = [
    "Mathematics",
    "Physics",
    "Chemistry",
    "Biology",
    "History",
    "Geography",
    "Literature",
    "English",
    "Physical Education",
    "Arts",
    "Music",
    "Computer Science",
];

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub teacher_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Grade {
    pub course_id: String,
    pub course_name: String,
    pub grade: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingTask {
    pub task_id: String,
    pub course_name: String,
    pub course_id: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentData {
    pub student_id: String,
    pub student_name: String,
    pub enrolled_courses: Vec<Course>,
    pub pending_tasks: Vec<PendingTask>,
    pub grades: Vec<Grade>,
    /// Courses graded below [`FOCUS_THRESHOLD`].
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherCourseMetrics {
    pub course_id: String,
    pub course_name: String,
    pub student_count: u32,
    pub overdue_tasks: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LowPerformingStudent {
    pub student_id: String,
    pub student_name: String,
    pub course_name: String,
    pub course_id: String,
    pub grade: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherData {
    pub teacher_id: String,
    pub teacher_name: String,
    pub courses: Vec<TeacherCourseMetrics>,
    pub pending_tasks: Vec<PendingTask>,
    /// Sorted by ascending grade.
    pub low_performers: Vec<LowPerformingStudent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Overdue => "overdue",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInfo {
    pub student_id: String,
    pub student_name: Option<String>,
    /// "Month YYYY" labels, most recent first.
    pub unpaid_months: Vec<String>,
    pub amount_due: f64,
    pub payment_month: Option<String>,
    pub status: PaymentStatus,
    pub receipt_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherMetrics {
    pub teacher_id: String,
    pub teacher_name: String,
    pub classes_taught_last_week: u32,
    pub grades_published_last_week: u32,
    pub below_average_percentage: f64,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdministratorData {
    pub delinquent_students: Vec<PaymentInfo>,
    pub low_performing_students: Vec<LowPerformingStudent>,
    pub teacher_performance: Vec<TeacherMetrics>,
}

fn pick<R: Rng + ?Sized>(rng: &mut R, pool: &[&str]) -> String {
    pool.choose(rng).copied().unwrap_or_default().to_string()
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `UPPER(first four chars)-suffix`, e.g. `MATH-100`.
fn course_id(course_name: &str, suffix: u32) -> String {
    let prefix: String = course_name.chars().take(4).collect();
    format!("{}-{suffix}", prefix.to_uppercase())
}

fn random_student_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("STU-{:03}", rng.random_range(1..=999))
}

fn random_teacher_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("TEACH-{:03}", rng.random_range(1..=99))
}

fn random_task_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("TASK-{}", rng.random_range(1000..=9999))
}

fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn student<R: Rng + ?Sized>(rng: &mut R, student_id: Option<&str>, today: NaiveDate) -> StudentData {
    let student_id = student_id.map_or_else(|| random_student_id(rng), str::to_string);
    let student_name = pick(rng, &STUDENT_NAMES);

    let count = rng.random_range(3..=6);
    let selected: Vec<&str> = COURSE_NAMES.choose_multiple(rng, count).copied().collect();

    let mut enrolled_courses = Vec::new();
    let mut grades = Vec::new();
    let mut pending_tasks = Vec::new();
    let mut focus_areas = Vec::new();

    for (i, name) in selected.iter().enumerate() {
        let id = course_id(name, 100 + i as u32);
        enrolled_courses.push(Course {
            course_id: id.clone(),
            course_name: name.to_string(),
            teacher_name: pick(rng, &TEACHER_NAMES),
        });

        let grade = one_decimal(rng.random_range(3.0..=10.0));
        if grade < FOCUS_THRESHOLD {
            focus_areas.push(name.to_string());
        }
        grades.push(Grade {
            course_id: id.clone(),
            course_name: name.to_string(),
            grade,
        });

        for _ in 0..rng.random_range(0..=3) {
            let due = today + TimeDelta::days(rng.random_range(1..=30));
            pending_tasks.push(PendingTask {
                task_id: random_task_id(rng),
                course_name: name.to_string(),
                course_id: id.clone(),
                due_date: due,
            });
        }
    }

    StudentData {
        student_id,
        student_name,
        enrolled_courses,
        pending_tasks,
        grades,
        focus_areas,
    }
}

pub fn teacher<R: Rng + ?Sized>(rng: &mut R, teacher_id: Option<&str>, today: NaiveDate) -> TeacherData {
    let teacher_id = teacher_id.map_or_else(|| random_teacher_id(rng), str::to_string);
    let teacher_name = pick(rng, &TEACHER_NAMES);

    let count = rng.random_range(2..=4);
    let selected: Vec<&str> = COURSE_NAMES.choose_multiple(rng, count).copied().collect();

    let mut courses = Vec::new();
    let mut pending_tasks = Vec::new();
    let mut low_performers = Vec::new();

    for (i, name) in selected.iter().enumerate() {
        let id = course_id(name, 100 + i as u32);
        courses.push(TeacherCourseMetrics {
            course_id: id.clone(),
            course_name: name.to_string(),
            student_count: rng.random_range(15..=35),
            overdue_tasks: rng.random_range(0..=5),
        });

        for _ in 0..rng.random_range(0..=3) {
            let due = today + TimeDelta::days(rng.random_range(-5..=15));
            pending_tasks.push(PendingTask {
                task_id: random_task_id(rng),
                course_name: name.to_string(),
                course_id: id.clone(),
                due_date: due,
            });
        }

        for _ in 0..rng.random_range(0..=3) {
            low_performers.push(LowPerformingStudent {
                student_id: random_student_id(rng),
                student_name: pick(rng, &STUDENT_NAMES),
                course_name: name.to_string(),
                course_id: id.clone(),
                grade: one_decimal(rng.random_range(2.0..=4.9)),
            });
        }
    }

    low_performers.sort_by(|a, b| a.grade.total_cmp(&b.grade));

    TeacherData {
        teacher_id,
        teacher_name,
        courses,
        pending_tasks,
        low_performers,
    }
}

pub fn payment<R: Rng + ?Sized>(rng: &mut R, student_id: Option<&str>, today: NaiveDate) -> PaymentInfo {
    let student_id = student_id.map_or_else(|| random_student_id(rng), str::to_string);
    let student_name = pick(rng, &STUDENT_NAMES);

    let unpaid = rng.random_range(0..=3i64);
    let unpaid_months: Vec<String> = (0..unpaid)
        .map(|i| month_label(today - TimeDelta::days(30 * (i + 1))))
        .collect();

    let (status, amount_due, receipt_id) = if unpaid_months.is_empty() {
        let receipt = format!("REC-{}", rng.random_range(10000..=99999));
        (PaymentStatus::Paid, 0.0, Some(receipt))
    } else {
        (PaymentStatus::Overdue, unpaid as f64 * MONTHLY_TUITION, None)
    };

    PaymentInfo {
        student_id,
        student_name: Some(student_name),
        unpaid_months,
        amount_due,
        payment_month: Some(month_label(today)),
        status,
        receipt_id,
    }
}

/// Insights for one teacher's weekly metrics.
pub fn teacher_insights(below_average_percentage: f64, grades_published: u32, classes_taught: u32) -> Vec<String> {
    let mut insights = Vec::new();
    if below_average_percentage < 10.0 {
        insights.push("Excellent student performance".to_string());
    } else if below_average_percentage > 20.0 {
        insights.push("High percentage of struggling students - may need support".to_string());
    }
    if grades_published > 15 {
        insights.push("Very active in grading".to_string());
    }
    if classes_taught > 6 {
        insights.push("High teaching load".to_string());
    }
    if insights.is_empty() {
        insights.push("Normal performance metrics".to_string());
    }
    insights
}

pub fn administrator<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> AdministratorData {
    let delinquent_students = (0..rng.random_range(3..=8))
        .map(|_| {
            let mut info = payment(rng, None, today);
            if info.unpaid_months.is_empty() {
                info.unpaid_months = vec![month_label(today - TimeDelta::days(30))];
                info.amount_due = MONTHLY_TUITION;
                info.status = PaymentStatus::Overdue;
                info.receipt_id = None;
            }
            info
        })
        .collect();

    let low_performing_students = (0..rng.random_range(5..=12))
        .map(|_| {
            let student_name = pick(rng, &STUDENT_NAMES);
            let student_id = random_student_id(rng);
            let course_name = pick(rng, &COURSE_NAMES);
            let course_id = course_id(&course_name, rng.random_range(100..=199));
            LowPerformingStudent {
                student_id,
                student_name,
                course_name,
                course_id,
                grade: one_decimal(rng.random_range(2.0..=4.9)),
            }
        })
        .collect();

    let teacher_performance = (0..rng.random_range(4..=8))
        .map(|_| {
            let teacher_name = pick(rng, &TEACHER_NAMES);
            let teacher_id = random_teacher_id(rng);
            let classes = rng.random_range(3..=8);
            let grades = rng.random_range(5..=20);
            let below = one_decimal(rng.random_range(5.0..=25.0));
            TeacherMetrics {
                teacher_id,
                teacher_name,
                classes_taught_last_week: classes,
                grades_published_last_week: grades,
                below_average_percentage: below,
                insights: teacher_insights(below, grades, classes),
            }
        })
        .collect();

    AdministratorData {
        delinquent_students,
        low_performing_students,
        teacher_performance,
    }
}

/// Student data from the thread RNG and today's date.
pub fn generate_student(student_id: Option<&str>) -> StudentData {
    student(&mut rand::rng(), student_id, today())
}

pub fn generate_teacher(teacher_id: Option<&str>) -> TeacherData {
    teacher(&mut rand::rng(), teacher_id, today())
}

pub fn generate_payment(student_id: Option<&str>) -> PaymentInfo {
    payment(&mut rand::rng(), student_id, today())
}

pub fn generate_administrator() -> AdministratorData {
    administrator(&mut rand::rng(), today())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn has_one_decimal(v: f64) -> bool {
        ((v * 10.0).round() - v * 10.0).abs() < 1e-9
    }

    #[test]
    fn course_ids() {
        assert_eq!(course_id("Mathematics", 100), "MATH-100");
        assert_eq!(course_id("Physical Education", 103), "PHYS-103");
        assert_eq!(course_id("Arts", 101), "ARTS-101");
    }

    #[test]
    fn student_within_ranges() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let s = student(&mut rng, None, date());

            assert!(s.student_id.starts_with("STU-") && s.student_id.len() == 7);
            assert!((3..=6).contains(&s.enrolled_courses.len()));
            let names: HashSet<_> = s.enrolled_courses.iter().map(|c| &c.course_name).collect();
            assert_eq!(names.len(), s.enrolled_courses.len(), "courses are distinct");
            assert!(s.pending_tasks.len() <= 3 * s.enrolled_courses.len());

            for (i, c) in s.enrolled_courses.iter().enumerate() {
                assert!(c.course_id.ends_with(&format!("-{}", 100 + i)));
            }
            for g in &s.grades {
                assert!((3.0..=10.0).contains(&g.grade));
                assert!(has_one_decimal(g.grade));
                assert_eq!(s.focus_areas.contains(&g.course_name), g.grade < FOCUS_THRESHOLD);
            }
            for t in &s.pending_tasks {
                let days = (t.due_date - date()).num_days();
                assert!((1..=30).contains(&days));
                let n: u32 = t.task_id.trim_start_matches("TASK-").parse().unwrap();
                assert!((1000..=9999).contains(&n));
            }
        }
    }

    #[test]
    fn student_keeps_given_id() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(student(&mut rng, Some("5511999990000"), date()).student_id, "5511999990000");
    }

    #[test]
    fn teacher_within_ranges() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let t = teacher(&mut rng, None, date());

            let n: u32 = t.teacher_id.trim_start_matches("TEACH-").parse().unwrap();
            assert!((1..=99).contains(&n));
            assert!((2..=4).contains(&t.courses.len()));
            for c in &t.courses {
                assert!((15..=35).contains(&c.student_count));
                assert!(c.overdue_tasks <= 5);
            }
            for task in &t.pending_tasks {
                let days = (task.due_date - date()).num_days();
                assert!((-5..=15).contains(&days));
            }
            for lp in &t.low_performers {
                assert!((2.0..=4.9).contains(&lp.grade));
            }
            assert!(t.low_performers.windows(2).all(|w| w[0].grade <= w[1].grade));
        }
    }

    #[test]
    fn payment_status_follows_unpaid_months() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let p = payment(&mut rng, Some("STU-001"), date());
            assert_eq!(p.payment_month.as_deref(), Some("October 2026"));
            if p.unpaid_months.is_empty() {
                assert_eq!(p.status, PaymentStatus::Paid);
                assert_eq!(p.amount_due, 0.0);
                let n: u32 = p.receipt_id.as_deref().unwrap().trim_start_matches("REC-").parse().unwrap();
                assert!((10000..=99999).contains(&n));
            } else {
                assert!(p.unpaid_months.len() <= 3);
                assert_eq!(p.status, PaymentStatus::Overdue);
                assert_eq!(p.amount_due, p.unpaid_months.len() as f64 * MONTHLY_TUITION);
                assert!(p.receipt_id.is_none());
                assert_eq!(p.unpaid_months[0], "September 2026");
            }
        }
    }

    #[test]
    fn administrator_within_ranges() {
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let a = administrator(&mut rng, date());

            assert!((3..=8).contains(&a.delinquent_students.len()));
            for d in &a.delinquent_students {
                assert!(!d.unpaid_months.is_empty());
                assert_eq!(d.status, PaymentStatus::Overdue);
                assert!(d.amount_due >= MONTHLY_TUITION);
            }

            assert!((5..=12).contains(&a.low_performing_students.len()));
            for lp in &a.low_performing_students {
                let suffix: u32 = lp.course_id.rsplit('-').next().unwrap().parse().unwrap();
                assert!((100..=199).contains(&suffix));
            }

            assert!((4..=8).contains(&a.teacher_performance.len()));
            for t in &a.teacher_performance {
                assert!((3..=8).contains(&t.classes_taught_last_week));
                assert!((5..=20).contains(&t.grades_published_last_week));
                assert!((5.0..=25.0).contains(&t.below_average_percentage));
                assert!(!t.insights.is_empty());
            }
        }
    }

    #[test]
    fn insight_rules() {
        assert_eq!(teacher_insights(8.0, 10, 4), vec!["Excellent student performance"]);
        assert_eq!(
            teacher_insights(22.5, 16, 7),
            vec![
                "High percentage of struggling students - may need support",
                "Very active in grading",
                "High teaching load",
            ]
        );
        assert_eq!(teacher_insights(15.0, 10, 5), vec!["Normal performance metrics"]);
        assert_eq!(teacher_insights(20.0, 15, 6), vec!["Normal performance metrics"]);
    }

    #[test]
    fn serializes_status_lowercase() {
        let mut rng = StdRng::seed_from_u64(3);
        let json = serde_json::to_value(payment(&mut rng, None, date())).unwrap();
        let status = json["status"].as_str().unwrap();
        assert!(status == "paid" || status == "overdue");
    }
}
