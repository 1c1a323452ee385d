//! JavaScript evaluated inside the controlled page
//!
//! Every script starts with an `/* adbanner:<name> */` marker so a page trace
//! (or a scripted test page) can tell them apart.

use crate::model::{Category, ExtractedElement, Locator};
use crate::utils::constants::LIVE_SELECTIONS_MESSAGE;

/// True once `document.body` exists
pub const BODY_READY: &str = "/* adbanner:body-ready */ document.body !== null";

/// True once every `<img>` finished loading with real pixels
pub const IMAGES_SETTLED: &str = "/* adbanner:images-settled */ \
Array.from(document.images).every((img) => img.complete && img.naturalHeight > 0)";

/// Raw material for the heuristic extractor
///
/// Returns `{hasBody:false}` when there is no body, otherwise the body text and
/// the first image source / button text (null when absent).
pub const HEURISTIC_PROBE: &str = r#"/* adbanner:heuristic */
(() => {
  if (!document.body) {
    return { hasBody: false };
  }
  const img = document.querySelector("img");
  const button = document.querySelector("button");
  return {
    hasBody: true,
    text: document.body.innerText || "",
    image: img && img.src ? img.src : null,
    button: button ? button.innerText : null,
  };
})()"#;

/// `snapshotElement(el)`: raw attributes consumed by `ElementSnapshot`
const SNAPSHOT_FN: &str = r#"
function snapshotElement(el) {
  const attr = (name) => (el.getAttribute ? el.getAttribute(name) : null);
  const link = el.closest ? el.closest("a") : null;
  let background = null;
  try {
    background = window.getComputedStyle(el).backgroundImage;
  } catch (e) {
    background = null;
  }
  return {
    tag: (el.tagName || "").toLowerCase(),
    id: el.id || null,
    classList: Array.from(el.classList || []),
    className: typeof el.className === "string" ? el.className : null,
    src: typeof el.src === "string" && el.src ? el.src : null,
    dataSrc: attr("data-src"),
    alt: attr("alt"),
    role: attr("role"),
    innerText: typeof el.innerText === "string" ? el.innerText : null,
    textContent: el.textContent,
    title: typeof el.title === "string" && el.title ? el.title : null,
    href: el.href ? String(el.href) : null,
    formaction: attr("formaction"),
    ancestorHref: link && link.href ? String(link.href) : null,
    onclick: attr("onclick"),
    backgroundImage: background,
  };
}
"#;

fn js_string(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string())
}

/// Scroll to the bottom in fixed steps to trigger lazy loading
///
/// Resolves with the scrolled distance once `totalHeight >= scrollHeight`
/// or after `max_steps` steps, whichever comes first.
pub fn scroll_script(step_px: u32, interval_ms: u64, max_steps: u32) -> String {
    format!(
        r#"/* adbanner:scroll */
new Promise((resolve) => {{
  let totalHeight = 0;
  let steps = 0;
  const timer = setInterval(() => {{
    const scrollHeight = document.body ? document.body.scrollHeight : 0;
    window.scrollBy(0, {step_px});
    totalHeight += {step_px};
    steps += 1;
    if (totalHeight >= scrollHeight || steps >= {max_steps}) {{
      clearInterval(timer);
      resolve(totalHeight);
    }}
  }}, {interval_ms});
}})"#
    )
}

/// Snapshot the first element matching `locator`, or `null`
pub fn replay_script(locator: &Locator) -> String {
    format!(
        r#"/* adbanner:replay */
(() => {{
{SNAPSHOT_FN}
  const el = document.querySelector({selector});
  return el ? snapshotElement(el) : null;
}})()"#,
        selector = js_string(locator.as_str()),
    )
}

/// Post the accepted selections to listeners inside the page
///
/// Embedding frontends receive `{type: "scraper-data", payload: [...]}` on
/// `window` after every accepted selection.
pub fn publish_selections_script(selections: &[ExtractedElement]) -> String {
    let payload = serde_json::to_string(selections).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"/* adbanner:publish */
window.postMessage({{ type: {message}, payload: {payload} }}, "*");
true"#,
        message = js_string(LIVE_SELECTIONS_MESSAGE),
    )
}

/// Annotation overlay
///
/// Installs the welcome modal, category menu and Done button. All state lives
/// in this closure; every transition is pushed to the host as one JSON event
/// through `window[binding]`. Returns `false` when already installed.
pub fn annotator_script(binding: &str) -> String {
    let menu: Vec<(&str, &str)> = Category::MENU
        .iter()
        .map(|c| (c.menu_label(), c.as_str()))
        .collect();
    let menu = serde_json::to_string(&menu).unwrap_or_else(|_| "[]".to_string());

    format!(
        r##"/* adbanner:annotator */
(() => {{
{SNAPSHOT_FN}
  const root = document.documentElement;
  if (root.dataset.adbannerAnnotator === "installed") {{
    return false;
  }}
  root.dataset.adbannerAnnotator = "installed";

  const binding = {binding};
  const categories = {menu};
  const passThrough = ["INPUT", "TEXTAREA", "SELECT", "BUTTON", "A"];
  let state = "idle";
  let target = null;
  let previousOutline = "";
  let accepted = 0;

  const emit = (event) => {{
    try {{
      window[binding](JSON.stringify(event));
    }} catch (e) {{
      console.warn("annotation channel unavailable", e);
    }}
  }};

  const ui = (tag, style) => {{
    const el = document.createElement(tag);
    el.dataset.adbannerUi = "true";
    Object.assign(el.style, style);
    return el;
  }};

  const toast = ui("div", {{
    position: "fixed", top: "70px", left: "50%", transform: "translateX(-50%)",
    padding: "10px 16px", background: "#DC3545", color: "white", borderRadius: "5px",
    zIndex: "10006", display: "none", fontSize: "14px",
  }});
  const warn = (message) => {{
    toast.innerText = message;
    toast.style.display = "block";
    setTimeout(() => {{ toast.style.display = "none"; }}, 2500);
  }};

  const welcome = ui("div", {{
    position: "fixed", top: "50%", left: "50%", transform: "translate(-50%, -50%)",
    background: "white", padding: "20px", borderRadius: "10px",
    boxShadow: "0px 4px 8px rgba(0,0,0,0.3)", zIndex: "10005", width: "400px",
    textAlign: "center", fontSize: "16px",
  }});
  welcome.innerHTML =
    "<h3>Select the content for your banner</h3>" +
    "<ol style='text-align:left;font-size:14px'>" +
    "<li>Click an element (text, image, price...) to select it.</li>" +
    "<li>Choose one category from the menu.</li>" +
    "<li>Repeat for every element you need, then press Done.</li>" +
    "</ol>";
  const start = ui("button", {{
    padding: "10px 15px", background: "#007BFF", color: "white", border: "none",
    borderRadius: "5px", cursor: "pointer",
  }});
  start.innerText = "Start";
  welcome.appendChild(start);

  const menu = ui("div", {{
    position: "fixed", top: "50%", left: "50%", transform: "translate(-50%, -50%)",
    padding: "15px", background: "white", border: "1px solid #ccc", borderRadius: "8px",
    boxShadow: "0px 4px 6px rgba(0,0,0,0.2)", zIndex: "10002", display: "none",
    flexWrap: "wrap", justifyContent: "center", gap: "10px", width: "400px",
  }});
  const heading = ui("p", {{ fontSize: "16px", fontWeight: "bold", width: "100%" }});
  heading.innerText = "Select a category for this element:";
  menu.appendChild(heading);

  const closeMenu = () => {{
    menu.style.display = "none";
    target = null;
    state = "awaitingSelection";
  }};

  categories.forEach(([label, value]) => {{
    const btn = ui("button", {{
      padding: "8px 12px", cursor: "pointer", border: "none", borderRadius: "5px",
      background: "#007BFF", color: "white", fontSize: "14px", flex: "1 1 45%",
    }});
    btn.innerText = label;
    btn.addEventListener("click", () => {{
      if (state !== "categoryMenuOpen" || !target) return;
      const snapshot = snapshotElement(target);
      const hasSource = (snapshot.src || "").trim() || (snapshot.dataSrc || "").trim();
      if (snapshot.tag === "img" && !hasSource) {{
        warn("This image has no source and was skipped.");
        target.style.outline = previousOutline;
      }} else {{
        accepted += 1;
      }}
      emit({{ kind: "categoryChosen", category: value, snapshot }});
      closeMenu();
    }});
    menu.appendChild(btn);
  }});

  const ignore = ui("button", {{
    padding: "8px 12px", cursor: "pointer", border: "none", borderRadius: "5px",
    background: "#DC3545", color: "white", fontSize: "14px", flex: "1 1 100%",
  }});
  ignore.innerText = "Ignore";
  ignore.addEventListener("click", () => {{
    if (state !== "categoryMenuOpen" || !target) return;
    target.style.outline = previousOutline;
    emit({{ kind: "ignored" }});
    closeMenu();
  }});
  menu.appendChild(ignore);

  const done = ui("button", {{
    position: "fixed", top: "15px", left: "50%", transform: "translateX(-50%)",
    padding: "10px 20px", zIndex: "10002", backgroundColor: "#28a745", color: "white",
    fontSize: "16px", border: "none", borderRadius: "5px", cursor: "pointer",
  }});
  done.innerText = "Done";
  done.addEventListener("click", () => {{
    if (state === "categoryMenuOpen") {{
      warn("Choose a category or Ignore first.");
      return;
    }}
    if (state !== "awaitingSelection") return;
    emit({{ kind: "doneRequested" }});
    if (accepted === 0) {{
      warn("No elements selected.");
      return;
    }}
    state = "finished";
    done.setAttribute("data-done", "true");
    document.removeEventListener("click", onPageClick, true);
  }});

  const onPageClick = (event) => {{
    const el = event.target;
    if (!(el instanceof Element) || el.closest("[data-adbanner-ui]")) return;
    if (passThrough.includes(el.tagName)) return;
    event.preventDefault();
    event.stopPropagation();
    if (state !== "awaitingSelection") return;
    target = el;
    previousOutline = el.style.outline;
    el.style.outline = "2px dashed blue";
    state = "categoryMenuOpen";
    menu.style.display = "flex";
    emit({{ kind: "elementPicked", snapshot: snapshotElement(el) }});
  }};

  start.addEventListener("click", () => {{
    if (state !== "welcomeShown") return;
    welcome.remove();
    state = "awaitingSelection";
    emit({{ kind: "welcomeDismissed" }});
  }});

  document.addEventListener("click", onPageClick, true);
  document.body.appendChild(menu);
  document.body.appendChild(done);
  document.body.appendChild(toast);
  document.body.appendChild(welcome);
  state = "welcomeShown";
  emit({{ kind: "welcomeShown" }});
  return true;
}})()"##,
        binding = js_string(binding),
    )
}
