//! HTML pages.
//!
//! Every piece of dynamic text goes through [`escape_html`].

use handin_common::errors::ErrorCode;
use handin_common::types::{Flash, SubmissionForm};

use crate::state::CourseRuntime;

/// Escape text for use in element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Login state shown in the page header.
pub struct Viewer<'a> {
    pub authenticated: bool,
    pub login: Option<&'a str>,
}

fn layout(title: &str, viewer: &Viewer<'_>, flashes: &[Flash], body: &str) -> String {
    let mut html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n<nav><a href=\"/\">handin</a> ",
        escape_html(title)
    );
    match (viewer.authenticated, viewer.login) {
        (true, Some(login)) => {
            html.push_str(&format!(
                "<span class=\"login\">Logged in as <strong>{}</strong></span> \
                 <a href=\"/logout\">Logout</a>",
                escape_html(login)
            ));
        }
        (true, None) => {
            html.push_str("<a href=\"/getlogin\">Finish login</a> <a href=\"/logout\">Logout</a>")
        }
        (false, _) => html.push_str("<a href=\"/login\">Login with GitHub</a>"),
    }
    html.push_str("</nav>\n<main>\n");
    for flash in flashes {
        html.push_str(&format!(
            "<div class=\"alert alert-{}\" role=\"alert\">{}</div>\n",
            flash.level.css_class(),
            escape_html(&flash.message)
        ));
    }
    html.push_str(body);
    html.push_str("\n</main>\n</body>\n</html>\n");
    html
}

pub fn home_page(
    viewer: &Viewer<'_>,
    flashes: &[Flash],
    courses: &[CourseRuntime],
    client_id: &str,
) -> String {
    let mut body = String::from("<h1>Course submissions</h1>\n");
    if viewer.authenticated {
        body.push_str("<ul class=\"courses\">\n");
        for runtime in courses {
            body.push_str(&format!(
                "<li><a href=\"/{}/\">{}</a></li>\n",
                escape_html(runtime.slug()),
                escape_html(&runtime.course.title)
            ));
        }
        body.push_str("</ul>\n");
    } else {
        body.push_str("<p>Log in with GitHub to submit your project.</p>\n");
        if client_id.is_empty() {
            body.push_str("<p class=\"text-muted\">No OAuth application is configured.</p>\n");
        }
    }
    layout("handin", viewer, flashes, &body)
}

pub fn course_page(
    viewer: &Viewer<'_>,
    flashes: &[Flash],
    runtime: &CourseRuntime,
    form: &SubmissionForm,
) -> String {
    let course = &runtime.course;
    let mut body = format!(
        "<h1>{}</h1>\n<form action=\"/{}/submit\" method=\"get\">\n\
         <label>GitHub repository <input type=\"text\" name=\"repo\" value=\"{}\" \
         placeholder=\"https://github.com/you/project\"></label>\n",
        escape_html(&course.title),
        escape_html(runtime.slug()),
        escape_html(&form.repo)
    );
    if course.has_secondary() {
        body.push_str(&format!(
            "<label>{} <input type=\"text\" name=\"shiny\" value=\"{}\"></label>\n",
            escape_html(&capitalize(course.secondary_label())),
            escape_html(&form.shiny)
        ));
    }
    body.push_str(&format!(
        "<label>Remark <input type=\"text\" name=\"remark\" value=\"{}\"></label>\n\
         <button type=\"submit\">Submit</button>\n</form>",
        escape_html(&form.remark)
    ));
    layout(&course.title, viewer, flashes, &body)
}

pub fn not_found_page(viewer: &Viewer<'_>, path: &str) -> String {
    let body = format!(
        "<h1>Not found</h1>\n<p>There is no course at <code>{}</code>.</p>",
        escape_html(path)
    );
    layout("Not found", viewer, &[], &body)
}

/// Page for failures the student cannot fix by resubmitting.
pub fn error_page(viewer: &Viewer<'_>, code: ErrorCode) -> String {
    let entry = code.entry();
    let body = format!(
        "<h1>Something went wrong</h1>\n<p>{}</p>\n<p>Please try again later. \
         If it keeps happening, tell your instructor the code <code>{}</code>.</p>",
        escape_html(&entry.message),
        escape_html(&entry.code)
    );
    layout("Error", viewer, &[], &body)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
