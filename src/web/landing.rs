use axum::response::Html;

/// Single-page UI: submit a review request, poll the task until it
/// settles, render the result. Served statically; all state lives in
/// the task manager behind the JSON API.
pub async fn landing_page() -> Html<&'static str> {
    Html(PAGE)
}

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Reel Critic</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 2rem clamp(1.5rem, 6vw, 3rem); border-bottom: 1px solid #e2e8f0; }
        header h1 { margin: 0 0 0.25rem; font-size: 1.9rem; }
        header p { margin: 0; color: #64748b; }
        main { max-width: 760px; margin: 0 auto; padding: 2rem clamp(1rem, 4vw, 2rem); }
        form { background: #ffffff; border: 1px solid #e2e8f0; border-radius: 12px; padding: 1.5rem; display: grid; gap: 1rem; }
        label { display: grid; gap: 0.35rem; font-weight: 600; font-size: 0.95rem; }
        input, select { padding: 0.55rem 0.7rem; border: 1px solid #cbd5f5; border-radius: 8px; font-size: 1rem; }
        .row { display: grid; grid-template-columns: 2fr 1fr; gap: 1rem; }
        .options { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; }
        .checkbox { display: flex; align-items: center; gap: 0.5rem; font-weight: 600; }
        button { padding: 0.7rem 1.4rem; border: none; border-radius: 999px; background: #2563eb; color: #ffffff; font-weight: 600; font-size: 1rem; cursor: pointer; }
        button:disabled { background: #94a3b8; cursor: wait; }
        #status { margin-top: 1.5rem; }
        .state { display: inline-block; padding: 0.25rem 0.8rem; border-radius: 999px; font-weight: 600; font-size: 0.9rem; }
        .state.pending, .state.running { background: #fef9c3; color: #854d0e; }
        .state.done { background: #ecfdf3; color: #166534; }
        .state.failed { background: #fef2f2; color: #b91c1c; }
        #result { margin-top: 1.5rem; background: #ffffff; border: 1px solid #e2e8f0; border-radius: 12px; padding: 1.5rem; display: none; }
        #result .score { font-size: 1.6rem; font-weight: 700; color: #2563eb; }
        #result .themes { color: #64748b; font-size: 0.95rem; }
        #result p.review { white-space: pre-wrap; line-height: 1.6; }
        .note { color: #b91c1c; }
    </style>
</head>
<body>
    <header>
        <h1>Reel Critic</h1>
        <p>Generated film reviews from movie metadata and audience sentiment.</p>
    </header>
    <main>
        <form id="review-form">
            <div class="row">
                <label>Movie title
                    <input name="title" required placeholder="Shawshank Redemption">
                </label>
                <label>Year (optional)
                    <input name="year" type="number" min="1888" max="2100">
                </label>
            </div>
            <div class="options">
                <label>Style
                    <select name="review_style">
                        <option value="professional">Professional</option>
                        <option value="casual">Casual</option>
                        <option value="academic">Academic</option>
                        <option value="entertaining">Entertaining</option>
                        <option value="brief">Brief</option>
                    </select>
                </label>
                <label>Audience
                    <select name="target_audience">
                        <option value="general">General</option>
                        <option value="enthusiast">Enthusiast</option>
                        <option value="critic">Critic</option>
                        <option value="student">Student</option>
                        <option value="family">Family</option>
                    </select>
                </label>
                <label>Max length (words)
                    <input name="max_length" type="number" value="1000" min="100" max="2500" step="100">
                </label>
                <label class="checkbox">
                    <input name="include_spoilers" type="checkbox"> Include spoilers
                </label>
            </div>
            <button type="submit" id="submit-btn">Generate review</button>
        </form>
        <div id="status"></div>
        <div id="result"></div>
    </main>
    <script>
        const form = document.getElementById('review-form');
        const statusBox = document.getElementById('status');
        const resultBox = document.getElementById('result');
        const submitBtn = document.getElementById('submit-btn');
        let pollTimer = null;

        form.addEventListener('submit', async (event) => {
            event.preventDefault();
            clearInterval(pollTimer);
            resultBox.style.display = 'none';
            submitBtn.disabled = true;

            const data = new FormData(form);
            const body = {
                title: data.get('title'),
                review_style: data.get('review_style'),
                target_audience: data.get('target_audience'),
                max_length: parseInt(data.get('max_length'), 10),
                include_spoilers: data.get('include_spoilers') === 'on',
            };
            const year = parseInt(data.get('year'), 10);
            if (!isNaN(year)) body.year = year;

            try {
                const res = await fetch('/api/review', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify(body),
                });
                const payload = await res.json();
                if (!res.ok) {
                    showStatus('failed', payload.message || 'Submission failed');
                    submitBtn.disabled = false;
                    return;
                }
                showStatus('pending', 'Task accepted, generating…');
                pollTimer = setInterval(() => poll(payload.task_id), 2000);
            } catch (err) {
                showStatus('failed', 'Request failed: ' + err);
                submitBtn.disabled = false;
            }
        });

        async function poll(taskId) {
            const res = await fetch('/api/review/status/' + taskId);
            const payload = await res.json();
            if (!res.ok) {
                clearInterval(pollTimer);
                showStatus('failed', payload.message || 'Status check failed');
                submitBtn.disabled = false;
                return;
            }

            showStatus(payload.state, 'Task is ' + payload.state);
            if (payload.state === 'done') {
                clearInterval(pollTimer);
                await showResult(taskId);
                submitBtn.disabled = false;
            } else if (payload.state === 'failed') {
                clearInterval(pollTimer);
                const detail = payload.error ? payload.error.message : 'Generation failed';
                showStatus('failed', detail);
                submitBtn.disabled = false;
            }
        }

        async function showResult(taskId) {
            const res = await fetch('/api/review/result/' + taskId);
            const payload = await res.json();
            if (!res.ok) {
                showStatus('failed', payload.message || 'Result fetch failed');
                return;
            }

            const themes = payload.themes.length
                ? 'Audience themes: ' + payload.themes.join(', ')
                : '';
            resultBox.innerHTML =
                '<div class="score">' + payload.composite_score.toFixed(1) + '/10</div>' +
                '<h2>' + escapeHtml(payload.title) + (payload.year ? ' (' + payload.year + ')' : '') + '</h2>' +
                '<div class="themes">' + escapeHtml(themes) + '</div>' +
                '<p class="review">' + escapeHtml(payload.review) + '</p>' +
                '<div class="themes">' + payload.word_count + ' words · generated ' + payload.generated_at + '</div>';
            resultBox.style.display = 'block';
        }

        function showStatus(state, message) {
            statusBox.innerHTML =
                '<span class="state ' + state + '">' + state + '</span> ' + escapeHtml(message);
        }

        function escapeHtml(value) {
            const div = document.createElement('div');
            div.textContent = value == null ? '' : String(value);
            return div.innerHTML;
        }
    </script>
</body>
</html>"#;
