//! Canned pages and datasets.

use cleanse_core::domains::cleanse::Dataset;

pub const LOGIN_PAGE: &str = r#"<html><body>
    <form><button type="submit" data-litms-control-urn="login-submit">Sign in</button></form>
</body></html>"#;

pub const REACTIVATE_PAGE: &str = r#"<html><body>
    <button class="premium-chooser__cta">Reactivate Sales Navigator</button>
</body></html>"#;

pub const LOCKED_LEAD: &str = r#"<html><body>
    <section class="_header_sqh8tm">
        <h1 data-anonymize="person-name">LinkedIn Member</h1>
    </section>
</body></html>"#;

pub fn lead_url(n: usize) -> String {
    format!("https://www.linkedin.com/sales/lead/{}", n)
}

pub fn profile_url(n: usize) -> String {
    format!("https://www.linkedin.com/in/person-{}", n)
}

/// Sales Navigator lead page.
pub fn lead_page(name: &str, title: &str, company: &str, connections: u32) -> String {
    format!(
        r#"<html><body>
        <section class="_header_sqh8tm">
            <h1 data-anonymize="person-name">{name}</h1>
            <div class="meta">
                <div>Greater Boston</div>
                <div><span>{connections}</span> connections</div>
            </div>
        </section>
        <section data-sn-view-name="lead-current-role">
            <span data-anonymize="job-title">{title}</span>
            <a data-anonymize="company-name" href="/company/1">{company}</a>
        </section>
        </body></html>"#
    )
}

/// Public LinkedIn profile page with an optional about section.
pub fn profile_page(name: &str, title: &str, company: &str, connections: u32, about: &str) -> String {
    format!(
        r#"<html><body>
        <h1 class="text-heading-xlarge">{name}</h1>
        <ul class="top-card"><li>Boston</li><li><span>{connections}</span> connections</li></ul>
        <section data-view-name="profile-card">
            <div class="hoverable-link-text t-bold"><span aria-hidden="true">{title}</span></div>
            <ul>
                <li class="artdeco-list__item">
                    <a data-field="experience_company_logo" href="/company/1">
                        <span class="t-14 t-normal"><span aria-hidden="true">{company} · Full-time</span></span>
                    </a>
                </li>
            </ul>
        </section>
        <section class="about"><p>{about}</p></section>
        </body></html>"#
    )
}

/// One source row: name, title, company, url.
pub type Lead<'a> = (&'a str, &'a str, &'a str, &'a str);

pub fn sales_nav_dataset(leads: &[Lead<'_>]) -> Dataset {
    dataset("Sales Navigator URL", leads)
}

pub fn linkedin_dataset(leads: &[Lead<'_>]) -> Dataset {
    dataset("LinkedIn URL", leads)
}

fn dataset(url_header: &str, leads: &[Lead<'_>]) -> Dataset {
    Dataset::new(
        vec![
            "Full Name".into(),
            "Job Title".into(),
            "Company".into(),
            url_header.into(),
            "Region".into(),
        ],
        leads
            .iter()
            .map(|(name, title, company, url)| {
                vec![
                    name.to_string(),
                    title.to_string(),
                    company.to_string(),
                    url.to_string(),
                    "US".to_string(),
                ]
            })
            .collect(),
    )
}
