use chrono::{NaiveDate, NaiveDateTime};
use speculate2::speculate;
use syllabus_track::models::*;
use syllabus_track::seed::{initial_exams, initial_subjects};
use syllabus_track::stats::*;

fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M")
        .expect("Invalid test timestamp")
}

fn day(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("Invalid test date")
}

fn topic(id: &str, done: bool, priority: Option<Priority>, deadline: Option<&str>) -> Topic {
    Topic {
        id: id.to_string(),
        name: id.to_string(),
        is_completed: done,
        priority,
        deadline: deadline.map(day),
        links: vec![],
        images: vec![],
        note: None,
    }
}

fn subject(id: &str, topics: Vec<Topic>) -> Subject {
    Subject {
        id: id.to_string(),
        title: id.to_uppercase(),
        color: "#10b981".to_string(),
        topics,
    }
}

fn exam(id: &str, date: &str, time: Option<&str>) -> Exam {
    Exam {
        id: id.to_string(),
        subject: id.to_string(),
        date: Some(day(date)),
        time: time.map(str::to_string),
    }
}

speculate! {
    before {
        let now = at("2024-06-10", "08:00");
    }

    describe "completion totals" {
        it "reports 25 percent for one of four topics completed" {
            let subjects = vec![subject("acc", vec![
                topic("a", true, None, None),
                topic("b", false, None, None),
                topic("c", false, None, None),
                topic("d", false, None, None),
            ])];

            let d = Dashboard::compute(&subjects, &[], now);

            assert_eq!(d.total_tasks, 4);
            assert_eq!(d.completed_tasks, 1);
            assert_eq!(d.pending_tasks, 3);
            assert_eq!(d.completion_percentage, 25);
            assert_eq!(d.subject_progress[0].percentage, 25);
            assert_eq!(d.subject_progress[0].remaining, 3);
        }

        it "rounds halves up" {
            assert_eq!(percentage(1, 8), 13);
            assert_eq!(percentage(1, 3), 33);
            assert_eq!(percentage(2, 3), 67);
        }

        it "reports zero for an empty collection" {
            let d = Dashboard::compute(&[], &[], now);
            assert_eq!(d.completion_percentage, 0);
            assert!(d.subject_progress.is_empty());
        }

        it "counts only pending high-priority topics" {
            let subjects = vec![subject("s", vec![
                topic("a", false, Some(Priority::High), None),
                topic("b", true, Some(Priority::High), None),
                topic("c", false, Some(Priority::Low), None),
            ])];

            assert_eq!(Dashboard::compute(&subjects, &[], now).high_priority_pending, 1);
        }
    }

    describe "overdue" {
        it "counts a pending topic whose deadline was yesterday" {
            let pending = topic("t", false, None, Some("2024-06-09"));
            let done = topic("t", true, None, Some("2024-06-09"));
            let today = day("2024-06-10");

            assert!(is_overdue(&pending, today));
            assert!(!is_overdue(&done, today));
        }

        it "does not count a deadline of today" {
            let t = topic("t", false, None, Some("2024-06-10"));
            assert!(!is_overdue(&t, day("2024-06-10")));
            assert_eq!(deadline_status(day("2024-06-10"), day("2024-06-10")), DeadlineStatus::DueToday);
        }

        it "describes distance to the deadline" {
            let today = day("2024-06-10");
            assert_eq!(deadline_status(day("2024-06-07"), today), DeadlineStatus::Late(3));
            assert_eq!(deadline_status(day("2024-06-12"), today), DeadlineStatus::DaysLeft(2));
            assert_eq!(DeadlineStatus::Late(3).label(), "3d late");
        }
    }

    describe "priority mix" {
        it "omits empty buckets and keeps High, Medium, Low order" {
            let subjects = vec![subject("s", vec![
                topic("a", false, Some(Priority::Low), None),
                topic("b", false, Some(Priority::High), None),
                topic("c", false, Some(Priority::High), None),
                topic("d", true, Some(Priority::Medium), None),
                topic("e", false, None, None),
            ])];

            let mix = Dashboard::compute(&subjects, &[], now).priority_mix;

            let names: Vec<_> = mix.iter().map(|b| (b.name.as_str(), b.value)).collect();
            assert_eq!(names, vec![("High", 2), ("Low", 1)]);
            assert_eq!(mix[0].color, "#fb7185");
        }

        it "falls back to a single placeholder when nothing is pending" {
            let subjects = vec![subject("s", vec![topic("a", true, Some(Priority::High), None)])];

            let mix = Dashboard::compute(&subjects, &[], now).priority_mix;

            assert_eq!(mix.len(), 1);
            assert!(mix[0].is_placeholder());
            assert_eq!(mix[0].value, 1);
        }
    }

    describe "next exam" {
        it "shows hours when under 72 hours away" {
            let exams = vec![exam("micro", "2024-06-11", Some("09:00"))];

            let next = next_exam(&exams, now).expect("Expected next exam");

            assert_eq!(next.remaining, Countdown { value: 25, unit: CountdownUnit::Hours });
            assert_eq!(next.remaining.unit.label(), "Hours Left");
        }

        it "switches to days at 72 hours" {
            let exams = vec![exam("micro", "2024-06-13", Some("08:00"))];
            let next = next_exam(&exams, now).expect("Expected next exam");
            assert_eq!(next.remaining, Countdown { value: 3, unit: CountdownUnit::Days });
        }

        it "rounds partial days up" {
            let exams = vec![exam("micro", "2024-06-14", Some("1:00 PM - 4:00 PM"))];
            let next = next_exam(&exams, now).expect("Expected next exam");
            assert_eq!(next.remaining, Countdown { value: 5, unit: CountdownUnit::Days });
        }

        it "picks the earliest future exam and skips past ones" {
            let exams = vec![
                exam("late", "2024-06-20", None),
                exam("past", "2024-06-09", Some("09:00")),
                exam("soon", "2024-06-15", Some("9:00 AM - 12:00 PM")),
            ];

            let next = next_exam(&exams, now).expect("Expected next exam");
            assert_eq!(next.exam.id, "soon");
        }

        it "treats a missing time as local midnight" {
            let exams = vec![exam("today", "2024-06-10", None)];
            assert!(next_exam(&exams, now).is_none());
        }

        it "is absent when every exam has passed" {
            let exams = vec![exam("past", "2024-01-01", None)];
            assert!(Dashboard::compute(&[], &exams, now).next_exam.is_none());
        }

        it "orders the schedule and flags passed exams" {
            let exams = vec![
                exam("b", "2024-06-20", None),
                exam("a", "2024-06-01", None),
            ];

            let schedule = Dashboard::compute(&[], &exams, now).exam_schedule;

            assert_eq!(schedule[0].exam.id, "a");
            assert!(schedule[0].is_passed);
            assert!(!schedule[1].is_passed);
        }
    }

    describe "insights" {
        it "gives only the fallback tip when nothing qualifies" {
            let subjects = vec![subject("s", vec![
                topic("a", true, None, None),
                topic("b", false, None, None),
            ])];

            let insights = insights(&subjects, day("2024-06-10"));

            assert_eq!(insights.len(), 1);
            assert_eq!(insights[0].id, "tip-1");
            assert_eq!(insights[0].text, FALLBACK_TIP);
        }

        it "celebrates a fully completed subject" {
            let subjects = vec![subject("oop", vec![topic("a", true, None, None)])];
            let insights = insights(&subjects, day("2024-06-10"));
            assert_eq!(insights[0].id, "done-oop");
            assert_eq!(insights[0].kind, InsightKind::Success);
            assert_eq!(insights[0].text, "Completed: OOP");
        }

        it "uses a strict threshold for crushing it" {
            let exactly_three_quarters = subject("acc", vec![
                topic("a", true, None, None),
                topic("b", true, None, None),
                topic("c", true, None, None),
                topic("d", false, None, None),
            ]);
            let four_of_five = subject("oop", vec![
                topic("a", true, None, None),
                topic("b", true, None, None),
                topic("c", true, None, None),
                topic("d", true, None, None),
                topic("e", false, None, None),
            ]);

            let ids: Vec<_> = insights(&[exactly_three_quarters, four_of_five], day("2024-06-10"))
                .into_iter()
                .map(|i| i.id)
                .collect();

            assert_eq!(ids, vec!["crush-oop"]);
        }

        it "flags subjects with overdue topics" {
            let subjects = vec![subject("maths", vec![
                topic("a", false, None, Some("2024-06-01")),
                topic("b", false, None, Some("2024-06-08")),
                topic("c", false, None, Some("2024-06-30")),
            ])];

            let insights = insights(&subjects, day("2024-06-10"));

            assert_eq!(insights.len(), 1);
            assert_eq!(insights[0].id, "late-maths");
            assert_eq!(insights[0].kind, InsightKind::Danger);
            assert_eq!(insights[0].text, "Overdue: MATHS (2)");
        }
    }

    describe "invariants" {
        it "gives identical output for identical inputs" {
            let mut subjects = initial_subjects(day("2024-06-10"));
            subjects[0].topics[0].is_completed = true;
            let exams = initial_exams(day("2024-06-10"));

            let first = Dashboard::compute(&subjects, &exams, now);
            let second = Dashboard::compute(&subjects, &exams, now);

            assert_eq!(first, second);
            assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );
        }

        it "counts every topic as either completed or pending" {
            let mut subjects = initial_subjects(day("2024-06-10"));
            for s in &mut subjects {
                for (i, t) in s.topics.iter_mut().enumerate() {
                    t.is_completed = i % 3 == 0;
                }
            }

            let d = Dashboard::compute(&subjects, &[], now);

            assert_eq!(d.completed_tasks + d.pending_tasks, d.total_tasks);
            for p in &d.subject_progress {
                let subject = subjects.iter().find(|s| s.id == p.subject_id).unwrap();
                assert_eq!(p.completed + p.remaining, subject.topics.len());
            }
        }

        it "buckets every pending topic when each has a priority" {
            let subjects = vec![
                subject("a", vec![
                    topic("1", false, Some(Priority::High), None),
                    topic("2", false, Some(Priority::Medium), None),
                    topic("3", true, Some(Priority::Low), None),
                ]),
                subject("b", vec![
                    topic("4", false, Some(Priority::Low), None),
                    topic("5", false, Some(Priority::Medium), None),
                ]),
            ];

            let d = Dashboard::compute(&subjects, &[], now);

            let bucketed: usize = d.priority_mix.iter().map(|b| b.value).sum();
            assert_eq!(bucketed, d.pending_tasks);
            assert_eq!(d.pending_tasks, 4);
        }
    }
}
