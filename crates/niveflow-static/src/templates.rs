//! Page layout for the native bundler.

use minijinja::{context, Environment};
use serde::Serialize;

use crate::error::BuildError;

/// A sidebar entry.
#[derive(Debug, Clone, Serialize)]
pub struct NavLink {
    pub title: String,
    /// Link target; empty for directories
    pub href: String,
    pub children: Vec<NavLink>,
    pub active: bool,
}

/// A table of contents entry.
#[derive(Debug, Clone, Serialize)]
pub struct TocLink {
    pub title: String,
    pub id: String,
    pub level: u8,
}

/// Everything a page render needs.
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub title: String,
    pub site_title: String,
    pub logo: String,
    pub avatar: String,
    /// Rendered page body
    pub content: String,
    pub nav: Vec<NavLink>,
    pub toc: Vec<TocLink>,
    pub base_url: String,
}

pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Result<Self, BuildError> {
        let mut env = Environment::new();
        for (name, source) in [
            ("base.html", BASE_TEMPLATE),
            ("doc.html", DOC_TEMPLATE),
            ("nav.html", NAV_TEMPLATE),
        ] {
            env.add_template(name, source)
                .map_err(|e| BuildError::Template(e.to_string()))?;
        }
        Ok(Self { env })
    }

    pub fn render_page(&self, template: &str, page: &Context) -> Result<String, BuildError> {
        let tmpl = self
            .env
            .get_template(template)
            .map_err(|e| BuildError::Template(e.to_string()))?;

        tmpl.render(context! {
            title => &page.title,
            site_title => &page.site_title,
            logo => &page.logo,
            avatar => &page.avatar,
            content => &page.content,
            nav => &page.nav,
            toc => &page.toc,
            base_url => &page.base_url,
        })
        .map_err(|e| BuildError::Template(e.to_string()))
    }
}

const BASE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }} - {{ site_title }}</title>
  <link rel="stylesheet" href="{{ base_url }}assets/main.css">
</head>
<body>
  <div class="layout">
    <nav class="sidebar">
      {% include "nav.html" %}
    </nav>
    <main class="main">
      {% block content %}{% endblock %}
    </main>
  </div>
  <script src="{{ base_url }}assets/main.js"></script>
</body>
</html>"##;

const DOC_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block content %}
<article class="doc">
  <div class="content">
    {{ content | safe }}
  </div>
</article>

{% if toc %}
<aside class="toc">
  <h2>On this page</h2>
  <ul>
  {% for entry in toc %}
    <li class="toc-level-{{ entry.level }}">
      <a href="#{{ entry.id }}">{{ entry.title }}</a>
    </li>
  {% endfor %}
  </ul>
</aside>
{% endif %}
{% endblock %}"##;

const NAV_TEMPLATE: &str = r##"<div class="nav-header">
  {% if avatar %}<img class="nav-avatar" src="{{ avatar }}" alt="">{% endif %}
  <a href="{{ base_url }}" class="nav-logo">{{ logo }}</a>
</div>
<ul class="nav-list">
{% for item in nav recursive %}
  <li class="nav-item{% if item.active %} active{% endif %}">
    {% if item.href %}<a href="{{ item.href }}">{{ item.title }}</a>{% else %}<span class="nav-section">{{ item.title }}</span>{% endif %}
    {% if item.children %}
    <ul class="nav-children">{{ loop(item.children) }}</ul>
    {% endif %}
  </li>
{% endfor %}
</ul>"##;
