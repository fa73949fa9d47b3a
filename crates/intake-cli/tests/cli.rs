use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::{Value, json};

const FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../intake-spec/tests/fixtures/symptom_intake.json"
);

fn intake() -> Command {
    Command::cargo_bin("intake").expect("intake binary")
}

fn complete_answers() -> Value {
    json!({
        "answers": {
            "name": "李四",
            "birth": "1985-07-09",
            "gender": "女",
            "chief": "咳嗽三天",
            "symptoms": ["恶心", "其他"],
            "fever": "否",
            "history": ["以上都没有"],
            "allergy": "否认"
        },
        "details": { "symptoms": { "3": "乏力" } }
    })
}

#[test]
fn fill_walks_enabled_questions_and_prints_sections() -> Result<(), Box<dyn std::error::Error>>
{
    let answers = [
        "张三",
        "1990-01-02",
        "1",
        "头痛三天",
        "",
        "3,4",
        "乏力",
        "2",
        "2",
        "4",
        "2",
    ];
    let stdin = format!("{}\n", answers.join("\n"));

    intake()
        .arg("fill")
        .arg("--spec")
        .arg(FIXTURE)
        .write_stdin(stdin)
        .assert()
        .success()
        .stdout(predicate::str::contains("Questionnaire: 门诊预问诊问卷"))
        .stdout(predicate::str::contains("姓名:张三;出生日期:1990年01月02日;性别:男"))
        .stdout(predicate::str::contains(
            "主诉:头痛三天;伴随症状:头痛、其他；补充:乏力;发热:否;既往就诊:无就诊",
        ))
        .stdout(predicate::str::contains("既往史:以上都没有;过敏史:否认"))
        .stdout(predicate::str::contains("QR: version 10, level H"))
        .stdout(predicate::str::contains("最高体温").not());
    Ok(())
}

#[test]
fn fill_reprompts_on_invalid_input() -> Result<(), Box<dyn std::error::Error>> {
    let answers = [
        "", "张三", "1990/01/02", "1990-01-02", "9", "2", "头痛", "", "5", "1", "38.5", "2", "4",
        "",
    ];
    let stdin = format!("{}\n", answers.join("\n"));

    intake()
        .args(["fill", "--answers-json", "--spec", FIXTURE])
        .write_stdin(stdin)
        .assert()
        .success()
        .stderr(predicate::str::contains("This question requires an answer."))
        .stderr(predicate::str::contains("Please enter a date"))
        .stderr(predicate::str::contains("Choose a number from 1 to 2."))
        .stdout(predicate::str::contains("伴随症状:无伴随症状;发热:是;最高体温:38.5"))
        .stdout(predicate::str::contains("\"temperature\": \"38.5\""));
    Ok(())
}

#[test]
fn fill_fails_when_input_runs_out() {
    intake()
        .args(["fill", "--spec", FIXTURE])
        .write_stdin("张三\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("input closed"));
}

#[test]
fn validate_reports_single_notice_and_missing_fields() -> Result<(), Box<dyn std::error::Error>>
{
    let temp = assert_fs::TempDir::new()?;
    let answers = temp.child("answers.json");
    answers.write_str(&json!({ "answers": { "name": "张三", "fever": "是" } }).to_string())?;

    intake()
        .arg("validate")
        .arg("--spec")
        .arg(FIXTURE)
        .arg("--answers")
        .arg(answers.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Validation result: invalid"))
        .stdout(predicate::str::contains("请确保所有必选题目都已回答！").count(1))
        .stdout(predicate::str::contains("temperature"));
    Ok(())
}

#[test]
fn validate_accepts_complete_answers() -> Result<(), Box<dyn std::error::Error>> {
    let temp = assert_fs::TempDir::new()?;
    let answers = temp.child("answers.json");
    answers.write_str(&complete_answers().to_string())?;

    intake()
        .arg("validate")
        .arg("--spec")
        .arg(FIXTURE)
        .arg("--answers")
        .arg(answers.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation result: valid"));
    Ok(())
}

#[test]
fn aggregate_emits_json_sections() -> Result<(), Box<dyn std::error::Error>> {
    let temp = assert_fs::TempDir::new()?;
    let answers = temp.child("answers.json");
    answers.write_str(&complete_answers().to_string())?;

    let output = intake()
        .arg("aggregate")
        .arg("--json")
        .arg("--spec")
        .arg(FIXTURE)
        .arg("--answers")
        .arg(answers.path())
        .output()?;
    assert!(output.status.success());

    let sections: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(sections.as_array().map(Vec::len), Some(3));
    assert_eq!(sections[0]["title"], "基本信息");
    assert_eq!(
        sections[0]["text"],
        "姓名:李四;出生日期:1985年07月09日;性别:女"
    );
    assert_eq!(
        sections[1]["text"],
        "主诉:咳嗽三天;伴随症状:恶心、其他；补充:乏力;发热:否"
    );
    assert_eq!(sections[2]["code"]["version"], 10);
    assert_eq!(sections[2]["code"]["error_correction"], "H");
    Ok(())
}

#[test]
fn check_strict_fails_on_warnings() -> Result<(), Box<dyn std::error::Error>> {
    let temp = assert_fs::TempDir::new()?;
    let spec = temp.child("spec.json");
    spec.write_str(
        &json!({
            "title": "随访",
            "sections": [{
                "title": "随访",
                "questions": [
                    { "id": "ok", "type": "text", "title": "情况" },
                    { "id": "never", "type": "text", "title": "从不显示", "visibleIf": [] }
                ]
            }]
        })
        .to_string(),
    )?;

    intake()
        .arg("check")
        .arg("--spec")
        .arg(spec.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 sections, 2 questions"))
        .stdout(predicate::str::contains("warning:"));

    intake()
        .arg("check")
        .arg("--strict")
        .arg("--spec")
        .arg(spec.path())
        .assert()
        .failure();
    Ok(())
}

#[test]
fn check_rejects_cycles() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cycle.json");
    std::fs::write(
        &path,
        json!({
            "title": "环",
            "sections": [{
                "title": "环",
                "questions": [
                    { "id": "a", "type": "radio", "title": "甲", "options": ["是"],
                      "visibleIf": { "questionId": "b", "anyOf": ["是"] } },
                    { "id": "b", "type": "radio", "title": "乙", "options": ["是"],
                      "visibleIf": { "questionId": "a", "anyOf": ["是"] } }
                ]
            }]
        })
        .to_string(),
    )?;

    intake()
        .arg("check")
        .arg("--spec")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: visibility rules form a cycle: a -> b -> a",
        ));
    Ok(())
}

#[test]
fn schema_describes_questionnaire_documents() -> Result<(), Box<dyn std::error::Error>> {
    let output = intake().arg("schema").output()?;
    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(schema["title"], "QuestionnaireSpec");
    Ok(())
}
