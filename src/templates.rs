use maud::{DOCTYPE, Markup, html};

use crate::{
    entities::movie,
    models::{CatalogueStats, ListQuery, Sort},
    transfer::ImportReport,
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

const SORT_OPTIONS: [(Sort, &str); 8] = [
    (Sort::DateAddedDesc, "Newest first"),
    (Sort::DateAddedAsc, "Oldest first"),
    (Sort::NameAsc, "Name A-Z"),
    (Sort::NameDesc, "Name Z-A"),
    (Sort::YearDesc, "Year, newest"),
    (Sort::YearAsc, "Year, oldest"),
    (Sort::RatingDesc, "Rating, highest"),
    (Sort::RatingAsc, "Rating, lowest"),
];

pub fn list_page(
    movies: &[movie::Model],
    q: &ListQuery,
    years: &[i32],
    tags: &[String],
    page: usize,
    total_pages: usize,
    total: u64,
    watch_again_count: u64,
    msg: Option<&str>,
) -> String {
    page_shell(
        "Filmshelf",
        html! {
            (flash(msg))
            div class="flex items-end justify-between gap-6" {
                div {
                    h1 class="text-3xl font-bold text-gray-900" { "Movies" }
                    p class="mt-1 text-gray-600" {
                        (total) " tracked · " (watch_again_count) " worth rewatching"
                    }
                }
            }

            form class="mt-6 bg-white shadow rounded-lg p-4 flex flex-wrap items-end gap-3" method="get" action="/" {
                div class="grow" {
                    label class="block text-xs font-medium text-gray-500" for="search" { "Search" }
                    input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-1.5" name="search" id="search" placeholder="Name or tag" value=[q.search.as_deref()];
                }
                div {
                    label class="block text-xs font-medium text-gray-500" for="year" { "Year" }
                    select class="mt-1 rounded-md border border-gray-300 px-2 py-1.5" name="year" id="year" {
                        option value="" { "All" }
                        @for year in years {
                            option value=(year) selected[q.year == Some(*year)] { (year) }
                        }
                    }
                }
                div {
                    label class="block text-xs font-medium text-gray-500" for="tag" { "Tag" }
                    select class="mt-1 rounded-md border border-gray-300 px-2 py-1.5" name="tag" id="tag" {
                        option value="" { "All" }
                        @for tag in tags {
                            option value=(tag) selected[q.tag.as_deref() == Some(tag.as_str())] { (tag) }
                        }
                    }
                }
                div {
                    label class="block text-xs font-medium text-gray-500" for="sort" { "Sort" }
                    select class="mt-1 rounded-md border border-gray-300 px-2 py-1.5" name="sort" id="sort" {
                        @for (sort, label) in SORT_OPTIONS {
                            option value=(sort.as_param()) selected[q.sort == sort] { (label) }
                        }
                    }
                }
                div {
                    label class="block text-xs font-medium text-gray-500" for="min_rating" { "Min rating" }
                    input class="mt-1 w-24 rounded-md border border-gray-300 px-2 py-1.5" type="number" name="min_rating" id="min_rating" step="0.5" min="0" max="10" value=[q.min_rating];
                }
                label class="flex items-center gap-2 text-sm text-gray-700 pb-1.5" {
                    input type="checkbox" name="watch_again" value="1" checked[q.watch_again_only];
                    "Watch again only"
                }
                button class="rounded-md bg-blue-600 px-4 py-1.5 font-semibold text-white hover:bg-blue-700" type="submit" { "Filter" }
            }

            @if movies.is_empty() {
                div class="mt-8 bg-white shadow rounded-lg p-8" {
                    p class="text-gray-600" { "No movies match. Try clearing the filters, or add one." }
                }
            } @else {
                div class="mt-8 grid gap-4 sm:grid-cols-2 lg:grid-cols-3 xl:grid-cols-4" {
                    @for m in movies {
                        (movie_card(m))
                    }
                }
            }

            @if total_pages > 1 {
                div class="mt-8 flex items-center justify-center gap-4 text-sm" {
                    @if page > 1 {
                        a class="text-blue-600 hover:text-blue-800" href=(list_url(q, page - 1)) { "← Previous" }
                    }
                    span class="text-gray-600" { "Page " (page) " of " (total_pages) }
                    @if page < total_pages {
                        a class="text-blue-600 hover:text-blue-800" href=(list_url(q, page + 1)) { "Next →" }
                    }
                }
            }
        },
    )
}

pub fn list_url(q: &ListQuery, page: usize) -> String {
    let mut url = String::from("/?");
    if let Some(search) = &q.search {
        url.push_str(&format!("search={}&", urlencoding::encode(search)));
    }
    if let Some(year) = q.year {
        url.push_str(&format!("year={year}&"));
    }
    if let Some(tag) = &q.tag {
        url.push_str(&format!("tag={}&", urlencoding::encode(tag)));
    }
    if q.watch_again_only {
        url.push_str("watch_again=1&");
    }
    if let Some(min_rating) = q.min_rating {
        url.push_str(&format!("min_rating={min_rating}&"));
    }
    url.push_str(&format!("sort={}&page={page}", q.sort.as_param()));
    url
}

fn movie_card(m: &movie::Model) -> Markup {
    html! {
        a class="block bg-white shadow rounded-lg overflow-hidden hover:shadow-md" href=(format!("/movie/{}", m.id)) {
            @if let Some(poster) = m.poster() {
                img class="h-64 w-full object-cover" src=(poster) alt=(m.name) loading="lazy";
            } @else {
                div class="h-64 w-full bg-gray-200 flex items-center justify-center text-gray-400" { "No poster" }
            }
            div class="p-4" {
                h2 class="font-semibold text-gray-900 truncate" { (m.name) }
                p class="text-sm text-gray-500" { (m.year) }
                div class="mt-2 flex items-center gap-2 text-sm" {
                    @if let Some(rating) = m.rating {
                        span class="text-amber-600 font-medium" { "★ " (format!("{rating:.1}")) }
                    }
                    @if m.watch_again {
                        span class="rounded bg-green-100 px-1.5 py-0.5 text-xs text-green-700" { "Watch again" }
                    }
                }
            }
        }
    }
}

pub fn detail_page(m: &movie::Model, msg: Option<&str>) -> String {
    page_shell(
        &m.name,
        html! {
            (flash(msg))
            div class="bg-white shadow rounded-lg overflow-hidden md:flex" {
                @if let Some(poster) = m.poster() {
                    img class="md:w-72 w-full object-cover" src=(poster) alt=(m.name);
                }
                div class="p-8 grow" {
                    h1 class="text-3xl font-bold text-gray-900" {
                        (m.name) span class="ml-2 font-normal text-gray-500" { "(" (m.year) ")" }
                    }
                    div class="mt-3 flex items-center gap-3" {
                        @if let Some(rating) = m.rating {
                            span class="text-amber-600 font-semibold" { "★ " (format!("{rating:.1}")) " / 10" }
                        }
                        @if m.watch_again {
                            span class="rounded bg-green-100 px-2 py-0.5 text-sm text-green-700" { "Would watch again" }
                        }
                    }
                    @if !m.tags_list().is_empty() {
                        div class="mt-4 flex flex-wrap gap-2" {
                            @for tag in m.tags_list() {
                                a class="rounded-full bg-gray-100 px-3 py-1 text-sm text-gray-700 hover:bg-gray-200" href=(format!("/?tag={}", urlencoding::encode(&tag))) { (tag) }
                            }
                        }
                    }
                    @if let Some(notes) = &m.notes {
                        p class="mt-4 text-gray-700 whitespace-pre-line" { (notes) }
                    }
                    p class="mt-4 text-sm text-gray-500" { "Added " (m.date_added_display()) }
                    div class="mt-6 flex items-center gap-4" {
                        a class="text-blue-600 hover:text-blue-800" href=(m.imdb_link) target="_blank" rel="noopener noreferrer" { "IMDb" }
                        @if let Some(tmdb_id) = m.tmdb_id {
                            a class="text-blue-600 hover:text-blue-800" href=(format!("https://www.themoviedb.org/movie/{tmdb_id}")) target="_blank" rel="noopener noreferrer" { "TMDB" }
                        }
                        a class="text-blue-600 hover:text-blue-800" href=(format!("/movie/{}/edit", m.id)) { "Edit" }
                        form method="post" action=(format!("/movie/{}/delete", m.id)) onsubmit="return confirm('Delete this movie?')" {
                            button class="text-red-600 hover:text-red-800" type="submit" { "Delete" }
                        }
                    }
                }
            }
        },
    )
}

pub fn movie_form_page(
    title: &str,
    action: &str,
    existing: Option<&movie::Model>,
    error: Option<&str>,
) -> String {
    let text = |f: fn(&movie::Model) -> Option<String>| existing.and_then(f);
    page_shell(
        title,
        html! {
            div class="max-w-2xl mx-auto bg-white shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold text-gray-900" { (title) }
                @if let Some(error) = error {
                    div class="mt-4 rounded-md bg-red-50 border border-red-200 p-3 text-sm text-red-700" { (error) }
                }
                form class="mt-6 space-y-4" method="post" action=(action) enctype="multipart/form-data" {
                    div {
                        label class="block text-sm font-medium text-gray-700" for="name" { "Movie name" }
                        input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-2" name="name" id="name" required
                            value=[existing.map(|m| m.name.clone())];
                    }
                    div class="grid grid-cols-2 gap-4" {
                        div {
                            label class="block text-sm font-medium text-gray-700" for="year" { "Release year" }
                            input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-2" type="number" name="year" id="year" min="1888" max="2030" required
                                value=[existing.map(|m| m.year)];
                        }
                        div {
                            label class="block text-sm font-medium text-gray-700" for="rating" { "My rating" }
                            input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-2" type="number" name="rating" id="rating" step="0.1" min="0" max="10" placeholder="1.0 - 10.0"
                                value=[existing.and_then(|m| m.rating)];
                        }
                    }
                    div {
                        label class="block text-sm font-medium text-gray-700" for="imdb_link" { "IMDb link" }
                        input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-2" type="url" name="imdb_link" id="imdb_link" placeholder="https://www.imdb.com/title/tt..." required
                            value=[existing.map(|m| m.imdb_link.clone())];
                    }
                    div {
                        label class="block text-sm font-medium text-gray-700" for="poster_url" { "Poster URL (optional)" }
                        input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-2" type="url" name="poster_url" id="poster_url" placeholder="Leave empty to auto-fetch from TMDB"
                            value=[text(|m| m.poster_url.clone())];
                    }
                    div {
                        label class="block text-sm font-medium text-gray-700" for="poster_image" { "Poster image (optional, overrides URL)" }
                        input class="mt-1 w-full" type="file" name="poster_image" id="poster_image" accept="image/*";
                    }
                    div {
                        label class="block text-sm font-medium text-gray-700" for="tags" { "Tags" }
                        input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-2" name="tags" id="tags" placeholder="Action, Drama, Sci-Fi (comma separated)"
                            value=[text(|m| m.tags.clone())];
                    }
                    div {
                        label class="block text-sm font-medium text-gray-700" for="notes" { "Notes" }
                        textarea class="mt-1 w-full rounded-md border border-gray-300 px-3 py-2" name="notes" id="notes" rows="3" placeholder="Your thoughts about this movie..." {
                            (text(|m| m.notes.clone()).unwrap_or_default())
                        }
                    }
                    label class="flex items-center gap-2 text-sm text-gray-700" {
                        input type="checkbox" name="watch_again" value="1" checked[existing.is_some_and(|m| m.watch_again)];
                        "Would watch again"
                    }
                    div class="flex items-center gap-4 pt-2" {
                        button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Save" }
                        a class="text-gray-600 hover:text-gray-800" href="/" { "Cancel" }
                    }
                }
            }
        },
    )
}

pub fn upload_page(report: Option<&ImportReport>, error: Option<&str>) -> String {
    page_shell(
        "Import CSV",
        html! {
            div class="max-w-2xl mx-auto bg-white shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold text-gray-900" { "Import movies from CSV" }
                p class="mt-2 text-sm text-gray-600" {
                    "Needs Name, Year and IMDb columns. Poster, Rating, Notes, Tags and Watch Again are optional. Synonymous headers such as \"Title\" or \"Genres\" work too."
                }

                @if let Some(error) = error {
                    div class="mt-4 rounded-md bg-red-50 border border-red-200 p-3 text-sm text-red-700" { (error) }
                }

                @if let Some(report) = report {
                    @if report.added > 0 {
                        div class="mt-4 rounded-md bg-green-50 border border-green-200 p-3 text-sm text-green-700" {
                            "Successfully added " (report.added) " movies!"
                        }
                    }
                    @if let Some(summary) = report.error_summary() {
                        div class="mt-4 rounded-md bg-amber-50 border border-amber-200 p-3 text-sm text-amber-800 whitespace-pre-line" { (summary) }
                    }
                }

                form class="mt-6 space-y-4" method="post" action="/upload" enctype="multipart/form-data" {
                    input class="w-full" type="file" name="csv_file" accept=".csv" required;
                    button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Import" }
                }
            }
        },
    )
}

pub fn stats_page(stats: &CatalogueStats) -> String {
    let pct = |count: u64| {
        if stats.total_movies == 0 { 0 } else { (count * 100 + stats.total_movies / 2) / stats.total_movies }
    };
    page_shell(
        "Statistics",
        html! {
            h1 class="text-3xl font-bold text-gray-900" { "Statistics" }

            div class="mt-6 grid gap-4 sm:grid-cols-2 lg:grid-cols-4" {
                (stat_card("Movies tracked", stats.total_movies.to_string()))
                (stat_card("Worth rewatching", stats.watch_again_count.to_string()))
                (stat_card("Average rating", stats.average_rating.map(|r| format!("{r:.1}")).unwrap_or_else(|| "—".to_string())))
                (stat_card("Distinct tags", stats.distinct_tag_count.to_string()))
            }

            div class="mt-8 grid gap-6 lg:grid-cols-2" {
                div class="bg-white shadow rounded-lg p-6" {
                    h2 class="font-semibold text-gray-900" { "By year" }
                    @if stats.movies_by_year.is_empty() {
                        p class="mt-3 text-sm text-gray-500" { "Nothing tracked yet." }
                    }
                    ul class="mt-3 space-y-2" {
                        @for yc in stats.movies_by_year.iter().take(10) {
                            li {
                                div class="flex justify-between text-sm text-gray-700" {
                                    span { (yc.year) }
                                    span { (yc.count) }
                                }
                                div class="mt-1 h-2 rounded bg-gray-100" {
                                    div class="h-2 rounded bg-blue-500" style=(format!("width: {}%", pct(yc.count))) {}
                                }
                            }
                        }
                    }
                }
                div class="bg-white shadow rounded-lg p-6" {
                    h2 class="font-semibold text-gray-900" { "Top tags" }
                    @if stats.tag_counts.is_empty() {
                        p class="mt-3 text-sm text-gray-500" { "No tags yet." }
                    }
                    ul class="mt-3 space-y-2" {
                        @for tc in stats.tag_counts.iter().take(10) {
                            li {
                                div class="flex justify-between text-sm text-gray-700" {
                                    span { (tc.tag) }
                                    span { (tc.count) }
                                }
                                div class="mt-1 h-2 rounded bg-gray-100" {
                                    div class="h-2 rounded bg-purple-500" style=(format!("width: {}%", pct(tc.count))) {}
                                }
                            }
                        }
                    }
                }
            }

            @if !stats.top_rated.is_empty() {
                div class="mt-8 bg-white shadow rounded-lg p-6" {
                    h2 class="font-semibold text-gray-900" { "Highest rated" }
                    ul class="mt-3 divide-y divide-gray-100" {
                        @for m in &stats.top_rated {
                            li class="py-2 flex justify-between text-sm" {
                                a class="text-blue-600 hover:text-blue-800" href=(format!("/movie/{}", m.id)) {
                                    (m.name) " (" (m.year) ")"
                                }
                                @if let Some(rating) = m.rating {
                                    span class="text-amber-600 font-medium" { "★ " (format!("{rating:.1}")) }
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn login_page(error: Option<&str>) -> String {
    page_shell(
        "Sign in",
        html! {
            div class="max-w-sm mx-auto bg-white shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold text-gray-900" { "Admin sign in" }
                @if let Some(error) = error {
                    div class="mt-4 rounded-md bg-red-50 border border-red-200 p-3 text-sm text-red-700" { (error) }
                }
                form class="mt-6 space-y-4" method="post" action="/login" {
                    div {
                        label class="block text-sm font-medium text-gray-700" for="token" { "Admin token" }
                        input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-2" type="password" name="token" id="token" required;
                    }
                    button class="w-full rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Sign in" }
                }
            }
        },
    )
}

pub fn error_page(message: String) -> String {
    page_shell(
        "Error",
        html! {
            div class="max-w-xl mx-auto bg-white shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold text-gray-900" { "Error" }
                p class="mt-4 text-gray-700" { (message) }
                a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
            }
        },
    )
}

fn stat_card(label: &str, value: String) -> Markup {
    html! {
        div class="bg-white shadow rounded-lg p-6" {
            p class="text-sm text-gray-500" { (label) }
            p class="mt-1 text-2xl font-bold text-gray-900" { (value) }
        }
    }
}

fn flash(msg: Option<&str>) -> Markup {
    html! {
        @if let Some(msg) = msg {
            div class="mb-6 rounded-md bg-green-50 border border-green-200 p-3 text-sm text-green-700" { (msg) }
        }
    }
}

fn page_shell(title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " · Filmshelf" }
                script src=(TAILWIND_CDN) {}
            }
            body class="min-h-screen bg-gray-50" {
                nav class="bg-white shadow" {
                    div class="max-w-6xl mx-auto px-6 py-3 flex items-center gap-6" {
                        a class="font-bold text-gray-900" href="/" { "Filmshelf" }
                        div class="flex items-center gap-4 text-sm text-gray-600" {
                            a class="hover:text-gray-900" href="/add" { "Add" }
                            a class="hover:text-gray-900" href="/upload" { "Import" }
                            a class="hover:text-gray-900" href="/stats" { "Stats" }
                            a class="hover:text-gray-900" href="/export" { "Export" }
                        }
                    }
                }
                main class="max-w-6xl mx-auto px-6 py-10" { (body) }
            }
        }
    }
    .into_string()
}
