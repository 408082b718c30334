pub const BUILTIN_CSS: &str = include_str!("builtin.css");

/// Browser side of "load more": one request at a time, append in arrival order, hide the
/// button once `next_page` runs out. Dates are shaped like the server-rendered ones.
pub const LOAD_MORE_JS: &str = r#"(function () {
  var button = document.getElementById("load-more");
  var list = document.getElementById("posts");
  if (!button || !list) return;

  var months = JSON.parse(button.getAttribute("data-months") || "[]");
  var postBase = button.getAttribute("data-post-base") || "/post/";
  var nextPage = button.getAttribute("data-next-page");
  var busy = false;

  function formatDate(iso) {
    if (!iso) return "";
    var m = /^(\d{4})-(\d{2})-(\d{2})/.exec(iso);
    if (!m) return "";
    return m[3] + " " + (months[parseInt(m[2], 10) - 1] || m[2]) + " " + m[1];
  }

  function el(tag, className, text) {
    var node = document.createElement(tag);
    if (className) node.className = className;
    if (text) node.textContent = text;
    return node;
  }

  function render(post) {
    var data = post.data || {};
    var article = el("article", "post-article");
    article.appendChild(el("h2", null, data.title || ""));
    article.appendChild(el("p", null, data.subtitle || ""));
    var info = el("div", "post-info");
    var date = el("div", "post-date");
    if (post.first_publication_date) {
      date.appendChild(el("time", null, formatDate(post.first_publication_date)));
    }
    var author = el("div", "post-author");
    author.appendChild(el("span", null, data.author || ""));
    info.appendChild(date);
    info.appendChild(author);
    article.appendChild(info);
    if (!post.uid) return article;
    var link = el("a", "post-link");
    link.href = postBase + post.uid;
    link.appendChild(article);
    return link;
  }

  function sync() {
    if (nextPage) {
      button.setAttribute("data-next-page", nextPage);
      button.disabled = busy;
    } else {
      button.remove();
    }
  }

  button.addEventListener("click", function () {
    if (busy || !nextPage) return;
    busy = true;
    sync();
    fetch(nextPage)
      .then(function (response) {
        if (!response.ok) throw new Error("HTTP " + response.status);
        return response.json();
      })
      .then(function (page) {
        (page.results || []).forEach(function (post) {
          list.insertBefore(render(post), button);
        });
        nextPage = page.next_page || null;
      })
      .catch(function (err) {
        console.error("load more failed", err);
      })
      .then(function () {
        busy = false;
        sync();
      });
  });
})();"#;
